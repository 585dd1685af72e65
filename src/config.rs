use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::drive::http::DEFAULT_BASE_URL;

const CONFIG_FILE_NAME: &str = "TrashCleaner";
const PAGE_TOKEN_FILE_NAME: &str = "page_token";
const CREDENTIAL_FILE_NAME: &str = "google-drive-trash-cleaner.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Days a file may stay in the trash before it is deleted.
    pub retention_days: u64,
    /// Retry budget for each remote call.
    pub timeout_secs: u64,
    pub page_token_file: PathBuf,
    pub credential_file: PathBuf,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub api_base_url: String,
    pub require_ownership: bool,
    /// Pause between retries of a single call.
    pub retry_interval_secs: u64,
    /// Attempts of the whole run on authentication or connection failures.
    pub run_retries: u32,
    pub run_retry_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            timeout_secs: 300,
            page_token_file: default_page_token_file(),
            credential_file: default_credential_file(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            require_ownership: true,
            retry_interval_secs: 2,
            run_retries: 3,
            run_retry_interval_secs: 2,
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn run_retry_interval(&self) -> Duration {
        Duration::from_secs(self.run_retry_interval_secs)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.retry_interval_secs == 0 {
            return Err(ConfigError::Message(
                "retry_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.run_retries == 0 {
            return Err(ConfigError::Message(
                "run_retries must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Load settings: defaults, then `TrashCleaner.toml` (or `path`), then `GDTC_*` variables.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name(CONFIG_FILE_NAME).required(false),
    };
    let builder = Config::builder()
        .add_source(file)
        .add_source(Environment::with_prefix("GDTC"))
        .build()?;
    builder.try_deserialize::<AppConfig>()?.validate()
}

// Beside the executable, so each install keeps its own position.
fn default_page_token_file() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(PAGE_TOKEN_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(PAGE_TOKEN_FILE_NAME))
}

fn default_credential_file() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".credentials")
        .join(CREDENTIAL_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.run_retries, 3);
        assert!(config.require_ownership);
        assert!(config.credential_file.ends_with(".credentials/google-drive-trash-cleaner.json"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaner.toml");
        fs::write(
            &path,
            "retention_days = 7\npage_token_file = \"/tmp/gdtc/token\"\nclient_id = \"abc\"\n",
        )
        .unwrap();

        let config = load_configuration(Some(&path)).unwrap();
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.page_token_file, PathBuf::from("/tmp/gdtc/token"));
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn test_zero_retry_interval_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaner.toml");
        fs::write(&path, "retry_interval_secs = 0\n").unwrap();
        assert!(load_configuration(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_configuration(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
