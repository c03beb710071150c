use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{NovaError, Result};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the local key-value store
    pub data_dir: PathBuf,

    /// Identity of the signed-in user
    pub user_id: String,

    /// Email of the signed-in user. Empty means signed out.
    pub user_email: String,

    /// Page that share links point at
    pub share_base_url: String,

    /// Link shortener endpoint (`GET <endpoint>?url=...`); none disables shortening
    pub shortener_endpoint: Option<String>,

    /// Links longer than this many characters are shortened
    pub shorten_threshold: usize,

    /// Timeout for outgoing HTTP requests, in seconds
    pub http_timeout_secs: u64,

    /// How often the deadline check runs (in hours)
    pub notification_check_hours: u32,

    /// Days of notification history to keep
    pub notification_log_days: u32,

    /// Base URL of the generative-AI service
    pub ai_base_url: String,

    /// Model used for suggestions and sorting
    pub ai_model: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("app", "nova", "nova-planner")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".nova"));

        Self {
            data_dir,
            user_id: "local".to_string(),
            user_email: String::new(),
            share_base_url: "https://nova-ai-planner.web.app/".to_string(),
            shortener_endpoint: None,
            shorten_threshold: 2000,
            http_timeout_secs: 15,
            notification_check_hours: 1,
            notification_log_days: 30,
            ai_base_url: "https://generativelanguage.googleapis.com".to_string(),
            ai_model: "gemini-1.5-flash".to_string(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("app", "nova", "nova-planner")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Loads the configuration from `path`, writing defaults there on first run.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            let content = fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content).map_err(|e| {
                NovaError::ConfigError {
                    message: format!("Invalid configuration in {}: {}", path.display(), e),
                }
            })?;
            return Ok(config);
        }

        let config = Config::default();
        match config.save(path) {
            Ok(()) => info!("Wrote default configuration to {}", path.display()),
            Err(e) => warn!("Could not write default configuration: {}", e),
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|_| NovaError::DirectoryError {
                    path: parent.to_path_buf(),
                })?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Applies `NOVA_DATA_DIR`, `NOVA_USER_ID` and `NOVA_USER_EMAIL`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("NOVA_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(user) = std::env::var("NOVA_USER_ID") {
            self.user_id = user;
        }
        if let Ok(email) = std::env::var("NOVA_USER_EMAIL") {
            self.user_email = email;
        }
    }

    /// Updates one setting from a `key=value` pair.
    pub fn set_from_pair(&mut self, pair: &str) -> Result<()> {
        let (key, value) = pair.split_once('=').ok_or_else(|| NovaError::ConfigError {
            message: format!("Expected key=value, got '{}'", pair),
        })?;
        let value = value.trim();
        let invalid = |e: String| NovaError::ConfigError {
            message: format!("Invalid value for {}: {}", key.trim(), e),
        };

        match key.trim() {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "user_id" => self.user_id = value.to_string(),
            "user_email" => self.user_email = value.to_string(),
            "share_base_url" => self.share_base_url = value.to_string(),
            "shortener_endpoint" => {
                self.shortener_endpoint = (!value.is_empty()).then(|| value.to_string())
            }
            "shorten_threshold" => self.shorten_threshold = value.parse::<usize>().map_err(|e| invalid(e.to_string()))?,
            "http_timeout_secs" => self.http_timeout_secs = value.parse::<u64>().map_err(|e| invalid(e.to_string()))?,
            "notification_check_hours" => {
                let hours = value.parse::<u32>().map_err(|e| invalid(e.to_string()))?;
                if hours == 0 {
                    return Err(invalid("must be at least 1".to_string()));
                }
                self.notification_check_hours = hours;
            }
            "notification_log_days" => {
                self.notification_log_days = value.parse::<u32>().map_err(|e| invalid(e.to_string()))?
            }
            "ai_base_url" => self.ai_base_url = value.to_string(),
            "ai_model" => self.ai_model = value.to_string(),
            other => {
                return Err(NovaError::ConfigError {
                    message: format!("Unknown setting '{}'", other),
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.shorten_threshold, 2000);

        let reloaded = Config::load_or_create(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn set_from_pair_validates() {
        let mut config = Config::default();
        config.set_from_pair("shorten_threshold = 500").unwrap();
        assert_eq!(config.shorten_threshold, 500);

        config.set_from_pair("http_timeout_secs=30").unwrap();
        config.set_from_pair("notification_check_hours=6").unwrap();
        config.set_from_pair("notification_log_days=14").unwrap();
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.notification_check_hours, 6);
        assert_eq!(config.notification_log_days, 14);
        assert!(config.set_from_pair("http_timeout_secs=soon").is_err());

        config.set_from_pair("shortener_endpoint=").unwrap();
        assert_eq!(config.shortener_endpoint, None);

        assert!(config.set_from_pair("notification_check_hours=0").is_err());
        assert!(config.set_from_pair("no_such_key=1").is_err());
        assert!(config.set_from_pair("missing-equals").is_err());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"user_email": "me@example.com"}"#).unwrap();

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.user_email, "me@example.com");
        assert_eq!(config.notification_check_hours, 1);
    }
}
