use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Environment variable consulted when no `--url` is given.
pub const ENDPOINT_ENV: &str = "AGENT_CHAT_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no agent endpoint configured: pass --url, set AGENT_CHAT_URL or add endpoint_url to the config file")]
    MissingEndpoint,

    #[error("invalid endpoint URL {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub endpoint_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Load the config for one run of the program.
    ///
    /// An unreadable file falls back to the defaults, unless `save` is set:
    /// the file is about to be rewritten and must not be clobbered.
    pub fn load_for_run(path: &Path, save: bool) -> Result<Self, ConfigError> {
        match Self::load_from(path) {
            Ok(config) => Ok(config),
            Err(e) if !save => {
                warn!("ignoring unreadable config {}: {}", path.display(), e);
                Ok(Self::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("agent-chat").join("config.json"))
    }

    /// Pick the endpoint: command line, then environment, then this file.
    ///
    /// Blank values are skipped so an empty `AGENT_CHAT_URL=` does not
    /// shadow the config file.
    pub fn resolve_endpoint(
        &self,
        cli_url: Option<&str>,
        env_url: Option<&str>,
    ) -> Result<Url, ConfigError> {
        let raw = [cli_url, env_url, self.endpoint_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .ok_or(ConfigError::MissingEndpoint)?;

        parse_endpoint(raw)
    }
}

/// Accept only absolute http(s) URLs.
pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            endpoint_url: Some("https://example.com/exec".to_string()),
        };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_for_run_tolerates_bad_file_without_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(Config::load_for_run(&path, false).unwrap(), Config::new());
    }

    #[test]
    fn test_load_for_run_refuses_bad_file_with_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load_for_run(&path, true),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_resolve_precedence() {
        let config = Config {
            endpoint_url: Some("https://file.example/exec".to_string()),
        };

        let url = config
            .resolve_endpoint(Some("https://cli.example/exec"), Some("https://env.example/exec"))
            .unwrap();
        assert_eq!(url.host_str(), Some("cli.example"));

        let url = config
            .resolve_endpoint(None, Some("https://env.example/exec"))
            .unwrap();
        assert_eq!(url.host_str(), Some("env.example"));

        let url = config.resolve_endpoint(None, Some("  ")).unwrap();
        assert_eq!(url.host_str(), Some("file.example"));
    }

    #[test]
    fn test_resolve_missing() {
        let err = Config::new().resolve_endpoint(None, None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEndpoint));
    }

    #[test]
    fn test_parse_endpoint_rejects_non_http() {
        assert!(parse_endpoint("http://localhost:8080/chat").is_ok());
        assert!(matches!(
            parse_endpoint("ftp://example.com"),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            parse_endpoint("example.com/exec"),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }
}
