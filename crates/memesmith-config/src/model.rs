use std::path::PathBuf;

use memesmith_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from YAML and overridden by environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub history: HistoryConfig,
    pub media: MediaConfig,
    pub triggers: TriggerConfig,
    pub database: DatabaseConfig,
    pub metrics: MetricsConfig,
    pub face_swap: FaceSwapConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Return a fixed idea without calling the provider.
    pub mock: bool,
    pub referer: Option<String>,
    pub title: Option<String>,
    /// Sampling temperature. Unset leaves the provider default.
    pub temperature: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "google/gemini-3-flash-preview".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            mock: false,
            referer: None,
            title: Some("Telegram Meme Generator".to_string()),
            temperature: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Return a placeholder template without calling the provider.
    pub mock: bool,
    /// Appended to every idea query before searching.
    pub query_suffix: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.tavily.com".to_string(),
            mock: false,
            query_suffix: " meme template".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./cache/templates"),
            ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Messages kept per conversation.
    pub size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { size: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// TrueType font for captions. Falls back to the built-in bitmap font.
    pub font_path: Option<PathBuf>,
    pub max_download_bytes: u64,
    pub download_timeout_secs: u64,
    /// Where rendered images live until they are delivered.
    pub work_dir: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            max_download_bytes: 5 * 1024 * 1024,
            download_timeout_secs: 10,
            work_dir: None,
        }
    }
}

impl MediaConfig {
    pub fn resolved_work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("memesmith"))
    }
}

/// A reaction symbol that starts the pipeline and the tone it asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTrigger {
    pub emoji: String,
    pub meaning: String,
}

impl ReactionTrigger {
    pub fn new(emoji: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
            meaning: meaning.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub reactions: Vec<ReactionTrigger>,
    /// Tell the chat when a reacted-to message is no longer in the history window.
    pub notify_missing_message: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            reactions: vec![
                ReactionTrigger::new("🤡", "clownish, absurd, mocking"),
                ReactionTrigger::new("🔥", "hype, excitement, something awesome"),
                ReactionTrigger::new("😡", "anger, outrage"),
            ],
            notify_missing_message: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file for the activity log. Unset disables durable logging.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceSwapConfig {
    pub enabled: bool,
}

impl AppConfig {
    /// Check settings needed by the pipeline itself.
    pub fn validate(&self) -> Result<()> {
        if self.history.size == 0 {
            return Err(Error::Config("history.size must be at least 1".into()));
        }
        if self.media.max_download_bytes == 0 {
            return Err(Error::Config(
                "media.max_download_bytes must be greater than 0".into(),
            ));
        }
        if !self.llm.mock && is_blank(self.llm.api_key.as_deref()) {
            return Err(Error::Config(
                "llm.api_key is required unless llm.mock is enabled".into(),
            ));
        }
        if !self.search.mock && is_blank(self.search.api_key.as_deref()) {
            return Err(Error::Config(
                "search.api_key is required unless search.mock is enabled".into(),
            ));
        }
        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(Error::Config("cache.ttl_secs must be greater than 0".into()));
        }
        Ok(())
    }

    /// Validate everything, including the transport credentials.
    pub fn validate_for_bot(&self) -> Result<()> {
        self.validate()?;
        if is_blank(self.telegram.bot_token.as_deref()) {
            return Err(Error::Config("telegram.bot_token is required".into()));
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
