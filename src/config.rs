use crate::events::ModelKind;
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const BASE_URL_ENV: &str = "DEEPSEEK_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

const CHAT_TIMEOUT_ENV: &str = "SEEKR_CHAT_TIMEOUT_SECS";
const REASONER_TIMEOUT_ENV: &str = "SEEKR_REASONER_TIMEOUT_SECS";
const CONNECT_TIMEOUT_ENV: &str = "SEEKR_CONNECT_TIMEOUT_SECS";

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    /// API key for DeepSeek
    pub api_key: String,

    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: String,

    /// Request timeout for the chat model
    pub chat_timeout: Duration,

    /// Request timeout for the reasoner model, which thinks before answering
    pub reasoner_timeout: Duration,

    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
}

impl Config {
    /// Load `.env` files and build the configuration from the process environment
    pub fn load() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .with_context(|| format!("{API_KEY_ENV} is not set (add it to the environment or a .env file)"))?;

        let base_url = lookup(BASE_URL_ENV)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Config {
            api_key,
            base_url,
            chat_timeout: seconds(&lookup, CHAT_TIMEOUT_ENV, 30)?,
            reasoner_timeout: seconds(&lookup, REASONER_TIMEOUT_ENV, 60)?,
            connect_timeout: seconds(&lookup, CONNECT_TIMEOUT_ENV, 10)?,
        })
    }

    /// Timeout applied to calls against the given model
    pub fn timeout_for(&self, model: ModelKind) -> Duration {
        match model {
            ModelKind::Chat => self.chat_timeout,
            ModelKind::Reasoner => self.reasoner_timeout,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("chat_timeout", &self.chat_timeout)
            .field("reasoner_timeout", &self.reasoner_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn seconds<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(Duration::from_secs(default)),
    }
}

/// Load `.env` from the working directory, then from the user config directory.
/// Variables already present in the environment are never overwritten.
fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    if let Some(path) = global_env_file() {
        if path.exists() && dotenvy::from_path(&path).is_ok() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
    }
}

fn global_env_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("seekr").join(".env"))
}
