//! Settings loaded once at startup
//!
//! Non-secret settings come from a YAML file (`config/settings.yaml` by
//! default). The API credential and a few overrides come from the process
//! environment, optionally seeded from a `.env` file.

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const DEFAULT_CONFIG_PATH: &str = "config/settings.yaml";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Rezehor, a helpful AI assistant.";

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_DATA_DIR: &str = "data";

const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
const ENV_LOG_LEVEL: &str = "REZEHOR_LOG_LEVEL";
const ENV_DATA_DIR: &str = "REZEHOR_DATA_DIR";

static SHARED: OnceCell<Arc<Config>> = OnceCell::const_new();

/// Model and transport settings read by every API call.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Used when a call does not supply its own system prompt.
    pub system_prompt: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub rotation: LogRotation,
    /// Number of rotated log files kept on disk.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            rotation: LogRotation::Daily,
            max_files: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    ai: AiConfig,
    logging: LoggingConfig,
}

/// Immutable settings snapshot shared by the client and the binary.
#[derive(Debug)]
pub struct Config {
    pub ai: AiConfig,
    pub logging: LoggingConfig,
    pub data_dir: PathBuf,
    pub api_key: Option<SecretString>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            logging: LoggingConfig::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            api_key: None,
        }
    }
}

impl Config {
    /// Load settings from `path`, `.env` and the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    fn load_with_env<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Yaml))
            .build()?;
        let file: FileSettings = settings.try_deserialize()?;

        let mut logging = file.logging;
        if let Some(level) = env(ENV_LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
            logging.level = level;
        }

        let config = Self {
            ai: file.ai,
            logging,
            data_dir: env(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            api_key: env(ENV_API_KEY).map(SecretString::from),
        };
        config.validate()?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject settings the remote endpoint would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.ai.model.trim().is_empty() {
            return Err(Error::Config("ai.model must not be empty".to_string()));
        }
        if self.ai.max_tokens == 0 {
            return Err(Error::Config(
                "ai.max_tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(Error::Config(format!(
                "ai.temperature must be within 0.0..=2.0, got {}",
                self.ai.temperature
            )));
        }
        reqwest::Url::parse(&self.ai.base_url).map_err(|e| {
            Error::Config(format!("ai.base_url '{}' is invalid: {}", self.ai.base_url, e))
        })?;
        Ok(())
    }

    /// The API credential, or a configuration error when it is absent or blank.
    pub fn require_api_key(&self) -> Result<&SecretString> {
        match &self.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => Ok(key),
            _ => Err(Error::Config(format!("{} is not set", ENV_API_KEY))),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Create the data and log directories if they do not exist yet.
    pub fn bootstrap_dirs(&self) -> Result<()> {
        for dir in [self.data_dir.clone(), self.log_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }
}

/// Process-wide configuration, loaded on first use.
///
/// Concurrent first callers wait on a single load. `path` is only consulted
/// by the call that performs it.
pub async fn shared(path: &Path) -> Result<Arc<Config>> {
    load_once(&SHARED, || Config::load(path)).await
}

async fn load_once<F>(cell: &OnceCell<Arc<Config>>, load: F) -> Result<Arc<Config>>
where
    F: FnOnce() -> Result<Config>,
{
    cell.get_or_try_init(|| async move { load().map(Arc::new) })
        .await
        .cloned()
}
