//! Shared application state: persistence handle, dictionary, optional
//! translation provider, and the job manager. Generalizes the teacher's
//! `Arc<RwLock<HashMap<...>>>` + `Option<OpenAI>` shape in `AppState::new`.

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::dictionary::Dictionary;
use crate::jobs::JobManager;
use crate::provider::TranslationProvider;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>,
  pub store: Store,
  pub dictionary: Arc<Dictionary>,
  pub provider: Option<Arc<TranslationProvider>>,
  pub jobs: JobManager,
}

impl AppState {
  /// Builds state from a loaded config: connects the store (running
  /// migrations), loads the CC-CEDICT dictionary, constructs the provider if
  /// `LLM_API_KEY` is set, and wires the job manager. Does not resume
  /// in-flight jobs; call `jobs.resume_restartable_jobs()` after the router
  /// is built (spec §5 startup lifecycle).
  pub async fn new(config: AppConfig) -> Result<Self, crate::error::AppError> {
    let store = Store::connect(&config.db_path).await?;
    let dictionary = Arc::new(Dictionary::load(&config.cedict_path));

    let provider = if config.llm_api_key.is_empty() {
      info!(target: "hanzi_tutor", "LLM_API_KEY not set; translation provider disabled");
      None
    } else {
      match TranslationProvider::new(
        config.llm_api_key.clone(),
        &config.llm_base_url,
        config.llm_model.clone(),
        config.provider_timeout_secs,
        &config.prompts,
      ) {
        Ok(p) => {
          info!(target: "hanzi_tutor", base_url = %config.llm_base_url, model = %config.llm_model, "translation provider enabled");
          Some(Arc::new(p))
        }
        Err(e) => {
          tracing::error!(target: "hanzi_tutor", error = %e, "failed to build translation provider; disabling");
          None
        }
      }
    };

    let config = Arc::new(config);
    let jobs = JobManager::new(store.clone(), dictionary.clone(), provider.clone(), config.clone());

    Ok(Self { config, store, dictionary, provider, jobs })
  }
}
