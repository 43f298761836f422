//! Persistence (spec §4.D): pool construction, migration runner, and the
//! translation/SRS repositories.
//!
//! Grounded on `AuroraMackenzie-Xenobot`'s `crates/api/src/database/mod.rs`
//! for the pool-construction/WAL/migration-runner shape, and its
//! `repository.rs` for the runtime-bound `sqlx::query_as::<_, T>(..).bind(..)`
//! query style (chosen over the `query!`/`query_as!` macros, which require a
//! live `DATABASE_URL` or offline cache at compile time — noted in
//! DESIGN.md).

pub mod srs;
pub mod translations;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::StoreError;

#[derive(Clone)]
pub struct Store {
  pub pool: SqlitePool,
}

impl Store {
  #[tracing::instrument(level = "info", target = "persistence", skip(db_path), fields(path = %db_path))]
  pub async fn connect(db_path: &str) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{db_path}"))?
      .create_if_missing(true)
      .journal_mode(SqliteJournalMode::Wal)
      .foreign_keys(true)
      .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new().max_connections(10).connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(target: "persistence", "migrations applied");

    Ok(Store { pool })
  }
}

#[cfg(test)]
pub async fn test_store() -> Store {
  let pool = SqlitePool::connect("sqlite::memory:").await.expect("in-memory pool");
  sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
  Store { pool }
}
