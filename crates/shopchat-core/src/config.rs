use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backend used when nothing else is configured (local development server)
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TITLE: &str = "Bike Shop Assistant";
pub const DEFAULT_PLACEHOLDER: &str = "Ask about our bikes...";

/// Environment variables consulted for the backend URL, in priority order
pub const BACKEND_URL_ENV_VARS: [&str; 2] = ["SHOPCHAT_BACKEND_URL", "BACKEND_URL"];

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub backend_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub title: Option<String>,
    pub placeholder: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the user's config directory; a missing file means defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Base URL of the assistant backend
    ///
    /// Order: explicit override (the CLI flag), then the environment, then the
    /// config file, then [`DEFAULT_BACKEND_URL`].
    pub fn resolve_backend_url(&self, cli_override: Option<&str>) -> String {
        self.resolve_backend_url_with(cli_override, |key| std::env::var(key).ok())
    }

    pub fn resolve_backend_url_with<F>(&self, cli_override: Option<&str>, env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        cli_override
            .map(str::to_string)
            .or_else(|| BACKEND_URL_ENV_VARS.iter().find_map(|key| env(key)))
            .or_else(|| self.backend_url.clone())
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    /// Per-request timeout; `None` (the default) waits indefinitely
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn placeholder(&self) -> &str {
        self.placeholder.as_deref().unwrap_or(DEFAULT_PLACEHOLDER)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("shopchat"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_to_local_backend() {
        let config = Config::new();
        assert_eq!(config.resolve_backend_url_with(None, no_env), DEFAULT_BACKEND_URL);
        assert_eq!(config.title(), DEFAULT_TITLE);
        assert_eq!(config.placeholder(), DEFAULT_PLACEHOLDER);
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn backend_url_priority() {
        let config = Config {
            backend_url: Some("http://from-file:5000".to_string()),
            ..Config::default()
        };
        let env = |key: &str| match key {
            "BACKEND_URL" => Some("http://from-env:5000".to_string()),
            _ => None,
        };

        assert_eq!(
            config.resolve_backend_url_with(Some("http://from-cli:5000"), env),
            "http://from-cli:5000"
        );
        assert_eq!(config.resolve_backend_url_with(None, env), "http://from-env:5000");
        assert_eq!(config.resolve_backend_url_with(None, no_env), "http://from-file:5000");
    }

    #[test]
    fn prefixed_env_var_wins() {
        let env = |key: &str| Some(format!("http://{}", key.to_lowercase()));
        assert_eq!(
            Config::new().resolve_backend_url_with(None, env),
            "http://shopchat_backend_url"
        );
    }

    #[test]
    fn blank_url_falls_back_to_default() {
        let config = Config {
            backend_url: Some("   ".to_string()),
            ..Config::default()
        };
        assert_eq!(config.resolve_backend_url_with(None, no_env), DEFAULT_BACKEND_URL);
    }

    #[test]
    fn zero_timeout_means_none() {
        let config = Config {
            request_timeout_secs: Some(0),
            ..Config::default()
        };
        assert!(config.request_timeout().is_none());

        let config = Config {
            request_timeout_secs: Some(30),
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        assert_eq!(Config::load_from(&path).unwrap(), Config::new());

        let config = Config {
            backend_url: Some("http://shop.internal:8080".to_string()),
            request_timeout_secs: Some(20),
            title: Some("Trail Outfitters".to_string()),
            placeholder: None,
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
