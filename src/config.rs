//! Application configuration: environment variables, an optional TOML
//! prompt-override file, and the plain-text segmentation instruction file
//! spec §4.C names explicitly. Generalizes the teacher's config
//! load-from-env-with-logged-fallback idiom.

use serde::Deserialize;

/// Prompt templates for the translation provider. Defaults are supplied in
/// `provider.rs`; a TOML file can override any subset of these fields.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptConfig {
  #[serde(default)]
  pub segmentation_system: String,
  #[serde(default)]
  pub pinyin_system: String,
  #[serde(default)]
  pub meaning_system: String,
  #[serde(default)]
  pub translate_system: String,
}

#[derive(Clone, Debug, Deserialize, Default)]
struct PromptFile {
  #[serde(default)]
  prompts: PromptConfig,
}

/// Top-level application configuration loaded from environment variables
/// (spec §6 "Environment" row).
#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub llm_base_url: String,
  pub llm_api_key: String,
  pub llm_model: String,
  pub session_secret: String,
  pub app_password: String,
  pub db_path: String,
  pub cedict_path: String,
  pub debug: bool,
  pub session_ttl_hours: i64,
  pub lease_seconds: i64,
  pub segment_pause_ms: u64,
  pub provider_timeout_secs: u64,
  pub prompts: PromptConfig,
}

impl AppConfig {
  pub fn from_env() -> Self {
    let port = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3000);
    let llm_base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let llm_api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
    let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let session_secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let app_password = std::env::var("APP_PASSWORD").unwrap_or_default();
    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/app.db".into());
    let cedict_path = std::env::var("CEDICT_PATH").unwrap_or_else(|_| "./data/cedict_ts.u8".into());
    let debug = std::env::var("DEBUG").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let session_ttl_hours = std::env::var("SESSION_TTL_HOURS").ok().and_then(|v| v.parse().ok()).unwrap_or(24 * 7);
    let lease_seconds = std::env::var("LEASE_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(30);
    let segment_pause_ms = std::env::var("SEGMENT_PAUSE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(15);
    let provider_timeout_secs = std::env::var("PROVIDER_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(600);

    let mut prompts = load_prompt_overrides(&cedict_path).unwrap_or_default();
    if let Some(segmentation) = load_segmentation_prompt_file(&cedict_path) {
      prompts.segmentation_system = segmentation;
    }

    AppConfig {
      port,
      llm_base_url,
      llm_api_key,
      llm_model,
      session_secret,
      app_password,
      db_path,
      cedict_path,
      debug,
      session_ttl_hours,
      lease_seconds,
      segment_pause_ms,
      provider_timeout_secs,
      prompts,
    }
  }
}

/// Resolves the segmentation-prompt TOML file the way spec §4.C resolves
/// `jepa/compiled_instruction.txt`: dictionary-directory-relative, then
/// `server/data/jepa/...`, then `data/jepa/...`; non-empty content wins,
/// otherwise logs a warning and falls back to built-in defaults.
fn load_prompt_overrides(cedict_path: &str) -> Option<PromptConfig> {
  let dict_dir = std::path::Path::new(cedict_path).parent().unwrap_or_else(|| std::path::Path::new("."));
  let candidates = [
    dict_dir.join("jepa/compiled_instruction.toml"),
    std::path::PathBuf::from("server/data/jepa/compiled_instruction.toml"),
    std::path::PathBuf::from("data/jepa/compiled_instruction.toml"),
  ];

  for path in candidates.iter() {
    match std::fs::read_to_string(path) {
      Ok(content) if !content.trim().is_empty() => match toml::from_str::<PromptFile>(&content) {
        Ok(parsed) => {
          tracing::info!(target: "hanzi_tutor", path = %path.display(), "loaded prompt overrides");
          return Some(parsed.prompts);
        }
        Err(e) => {
          tracing::error!(target: "hanzi_tutor", path = %path.display(), error = %e, "failed to parse prompt overrides; trying next candidate");
        }
      },
      Ok(_) => continue,
      Err(_) => continue,
    }
  }
  tracing::info!(target: "hanzi_tutor", "no prompt overrides found; using built-in defaults");
  None
}

/// Resolves the segmentation prompt per spec §4.C: a plain-text
/// `jepa/compiled_instruction.txt`, tried dictionary-directory-relative,
/// then `server/data/jepa/...`, then `data/jepa/...`. Non-empty content
/// wins over both a TOML override and the built-in default.
fn load_segmentation_prompt_file(cedict_path: &str) -> Option<String> {
  let dict_dir = std::path::Path::new(cedict_path).parent().unwrap_or_else(|| std::path::Path::new("."));
  let candidates = [
    dict_dir.join("jepa/compiled_instruction.txt"),
    std::path::PathBuf::from("server/data/jepa/compiled_instruction.txt"),
    std::path::PathBuf::from("data/jepa/compiled_instruction.txt"),
  ];

  for path in candidates.iter() {
    match std::fs::read_to_string(path) {
      Ok(content) if !content.trim().is_empty() => {
        tracing::info!(target: "hanzi_tutor", path = %path.display(), "loaded segmentation prompt from compiled instruction file");
        return Some(content);
      }
      Ok(_) => continue,
      Err(_) => continue,
    }
  }
  None
}
