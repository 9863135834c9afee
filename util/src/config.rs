//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.
//!
//! Every field has a default, so a bare environment still yields a usable
//! configuration. Numeric variables that fail to parse fall back to their
//! defaults rather than aborting the process.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    /// Which generation provider to construct: `gemini` or `openai`.
    pub llm_provider: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    /// Requests-per-minute budget of the generation provider.
    pub rate_limit_rpm: u32,
    /// Whole-chain retries for the normalization phase.
    pub max_retries: u32,
    pub similarity_threshold: f64,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "development".into(),
            project_name: "uml-grader".into(),
            log_level: "grader=info".into(),
            log_file: "grader.log".into(),
            log_to_stdout: false,
            llm_provider: "gemini".into(),
            gemini_api_key: String::new(),
            gemini_model: "gemini-2.5-flash".into(),
            openai_api_key: String::new(),
            openai_model: "gpt-4.1-nano".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            llm_temperature: 0.1,
            llm_max_tokens: 2000,
            llm_timeout_secs: 60,
            rate_limit_rpm: 15,
            max_retries: 3,
            similarity_threshold: 0.85,
        }
    }
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = AppConfig::default();

        Self {
            env: var_or("APP_ENV", &defaults.env),
            project_name: var_or("PROJECT_NAME", &defaults.project_name),
            log_level: var_or("LOG_LEVEL", &defaults.log_level),
            log_file: var_or("LOG_FILE", &defaults.log_file),
            log_to_stdout: var_or("LOG_TO_STDOUT", "false") == "true",
            llm_provider: var_or("LLM_PROVIDER", &defaults.llm_provider).to_lowercase(),
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: var_or("GEMINI_MODEL", &defaults.gemini_model),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: var_or("OPENAI_MODEL", &defaults.openai_model),
            openai_base_url: var_or("OPENAI_BASE_URL", &defaults.openai_base_url),
            llm_temperature: parsed_or("LLM_TEMPERATURE", defaults.llm_temperature),
            llm_max_tokens: parsed_or("LLM_MAX_TOKENS", defaults.llm_max_tokens),
            llm_timeout_secs: parsed_or("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs),
            rate_limit_rpm: parsed_or("RATE_LIMIT_RPM", defaults.rate_limit_rpm),
            max_retries: parsed_or("MAX_RETRIES", defaults.max_retries),
            similarity_threshold: parsed_or(
                "SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            ),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock is recovered, since the guarded value is plain data.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        AppConfig::set_field(|cfg| *cfg = AppConfig::from_env());
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_llm_provider(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.llm_provider = value.into());
    }

    pub fn set_gemini_api_key(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.gemini_api_key = value.into());
    }

    pub fn set_gemini_model(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.gemini_model = value.into());
    }

    pub fn set_openai_api_key(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.openai_api_key = value.into());
    }

    pub fn set_rate_limit_rpm(value: u32) {
        AppConfig::set_field(|cfg| cfg.rate_limit_rpm = value);
    }

    pub fn set_max_retries(value: u32) {
        AppConfig::set_field(|cfg| cfg.max_retries = value);
    }

    pub fn set_similarity_threshold(value: f64) {
        AppConfig::set_field(|cfg| cfg.similarity_threshold = value);
    }
}

// --- Free-function accessors, mirroring how callers read single values ---

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}
