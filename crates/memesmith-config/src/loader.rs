use std::path::{Path, PathBuf};

use memesmith_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// Loads [`AppConfig`] from an optional YAML file plus environment overrides.
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Read the file (if any), then apply process environment overrides.
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = match &self.path {
            Some(path) => Self::read_file(path)?,
            None => {
                debug!("no config file given, starting from defaults");
                AppConfig::default()
            }
        };
        apply_env(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<AppConfig> {
        info!("loading config from {}", path.display());
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        if raw.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = Some(v);
    }

    if let Some(v) = get("OPENROUTER_API_KEY") {
        config.llm.api_key = Some(v);
    }
    if let Some(v) = get("OPENROUTER_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = get("OPENROUTER_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Some(v) = get("LLM_MOCK_ENABLED") {
        config.llm.mock = parse_bool("LLM_MOCK_ENABLED", &v)?;
    }

    if let Some(v) = get("TAVILY_API_KEY") {
        config.search.api_key = Some(v);
    }
    if let Some(v) = get("SEARCH_MOCK_ENABLED") {
        config.search.mock = parse_bool("SEARCH_MOCK_ENABLED", &v)?;
    }

    if let Some(v) = get("CACHE_ENABLED") {
        config.cache.enabled = parse_bool("CACHE_ENABLED", &v)?;
    }
    if let Some(v) = get("CACHE_DIR") {
        config.cache.dir = PathBuf::from(v);
    }
    if let Some(v) = get("CACHE_TTL") {
        config.cache.ttl_secs = parse_num("CACHE_TTL", &v)?;
    }

    if let Some(v) = get("HISTORY_SIZE") {
        config.history.size = parse_num("HISTORY_SIZE", &v)?;
    }

    if let Some(v) = get("MAX_DOWNLOAD_BYTES") {
        config.media.max_download_bytes = parse_num("MAX_DOWNLOAD_BYTES", &v)?;
    }
    if let Some(v) = get("FONT_PATH") {
        config.media.font_path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("WORK_DIR") {
        config.media.work_dir = Some(PathBuf::from(v));
    }

    if let Some(v) = get("DATABASE_PATH") {
        config.database.path = Some(PathBuf::from(v));
    }

    if let Some(v) = get("METRICS_ENABLED") {
        config.metrics.enabled = parse_bool("METRICS_ENABLED", &v)?;
    }
    if let Some(v) = get("METRICS_PORT") {
        config.metrics.port = parse_num("METRICS_PORT", &v)?;
    }

    if let Some(v) = get("FACE_SWAP_ENABLED") {
        config.face_swap.enabled = parse_bool("FACE_SWAP_ENABLED", &v)?;
    }

    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("HISTORY_SIZE", "25"),
                ("LLM_MOCK_ENABLED", "true"),
                ("SEARCH_MOCK_ENABLED", "1"),
                ("CACHE_TTL", "60"),
                ("TAVILY_API_KEY", "tvly-test"),
                ("DATABASE_PATH", "/tmp/memes.db"),
            ]),
        )
        .expect("apply env");

        assert_eq!(config.history.size, 25);
        assert!(config.llm.mock);
        assert!(config.search.mock);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.search.api_key.as_deref(), Some("tvly-test"));
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/memes.db")));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        apply_env(&mut config, env(&[("OPENROUTER_MODEL", "  ")])).expect("apply env");
        assert_eq!(config.llm.model, "google/gemini-3-flash-preview");
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let mut config = AppConfig::default();
        let err = apply_env(&mut config, env(&[("HISTORY_SIZE", "ten")])).expect_err("bad num");
        assert!(err.to_string().contains("HISTORY_SIZE"));
    }

    #[test]
    fn malformed_bools_are_config_errors() {
        let mut config = AppConfig::default();
        let err =
            apply_env(&mut config, env(&[("CACHE_ENABLED", "maybe")])).expect_err("bad bool");
        assert!(err.to_string().contains("CACHE_ENABLED"));
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "history:\n  size: 4\ntriggers:\n  reactions:\n    - emoji: \"👍\"\n      meaning: approval\n"
        )
        .expect("write yaml");

        let config = ConfigLoader::read_file(file.path()).expect("load file");
        assert_eq!(config.history.size, 4);
        assert_eq!(config.triggers.reactions.len(), 1);
        assert_eq!(config.triggers.reactions[0].emoji, "👍");
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let config = ConfigLoader::read_file(file.path()).expect("load empty file");
        assert_eq!(config.history.size, 10);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ConfigLoader::read_file(Path::new("/definitely/not/here.yaml"))
            .expect_err("missing file");
        assert!(matches!(err, Error::Config(_)));
    }
}
