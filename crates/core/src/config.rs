//! Application configuration layered from defaults, a TOML file and the environment.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Directory under the platform config dir holding busbook files.
pub const APP_DIR: &str = "busbook";
/// Name of the configuration file inside [`APP_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
/// Name of the credential file inside [`APP_DIR`].
pub const CREDENTIALS_FILE: &str = "credentials.json";
/// Prefix for environment overrides, e.g. `BUSBOOK_API_URL`.
pub const ENV_PREFIX: &str = "BUSBOOK";

const DEFAULT_API_URL: &str = "http://localhost:4000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 5 * 60;
const DEFAULT_CAPACITY: u32 = 50;

/// Runtime settings for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the booking REST API.
    pub api_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Idle period after which an authenticated session is logged out.
    pub inactivity_timeout_secs: u64,
    /// Override for the credential file location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
    /// Seat cap used when a trip does not report its bus capacity.
    pub default_capacity: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            inactivity_timeout_secs: DEFAULT_INACTIVITY_TIMEOUT_SECS,
            credentials_path: None,
            default_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location plus environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(path)
    }

    /// Load configuration from an explicit file. A missing file falls back to defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let settings = Config::builder()
            .set_default("api_url", defaults.api_url)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default(
                "inactivity_timeout_secs",
                defaults.inactivity_timeout_secs as i64,
            )?
            .set_default("default_capacity", i64::from(defaults.default_capacity))?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        let mut loaded: AppConfig = settings.try_deserialize()?;
        if loaded.inactivity_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "inactivity_timeout_secs",
                reason: "must be at least 1 second",
            });
        }
        loaded.api_url = loaded.api_url.trim_end_matches('/').to_string();
        Ok(loaded)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Inactivity limit as a [`Duration`].
    pub fn inactivity_limit(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    /// Resolved credential file path.
    pub fn credentials_file(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| app_dir().join(CREDENTIALS_FILE))
    }
}

/// Root directory for busbook files under the user's config dir.
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default configuration file path, if a config dir exists on this platform.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Write a default config file when none exists yet.
pub fn ensure_default_config() -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    write_default_config(&path)
}

/// Write the default configuration to `path` unless the file already exists.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let defaults = AppConfig::default();
    let contents = format!(
        "# busbook client configuration\n\
         api_url = \"{}\"\n\
         request_timeout_secs = {}\n\
         inactivity_timeout_secs = {}\n\
         default_capacity = {}\n",
        defaults.api_url,
        defaults.request_timeout_secs,
        defaults.inactivity_timeout_secs,
        defaults.default_capacity,
    );
    fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.inactivity_limit(), Duration::from_secs(300));
        assert_eq!(config.default_capacity, 50);
        assert!(config.credentials_path.is_none());
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "api_url = \"https://buses.example.lk/api/\"\ninactivity_timeout_secs = 60\ncredentials_path = \"/tmp/creds.json\"\n",
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.api_url, "https://buses.example.lk/api");
        assert_eq!(config.inactivity_timeout_secs, 60);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.credentials_file(), PathBuf::from("/tmp/creds.json"));
        Ok(())
    }

    #[test]
    fn zero_inactivity_timeout_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "inactivity_timeout_secs = 0\n")?;

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "inactivity_timeout_secs",
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn default_file_is_written_once() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(&path)?;
        let written = fs::read_to_string(&path)?;
        assert!(written.contains("inactivity_timeout_secs = 300"));

        fs::write(&path, "api_url = \"http://custom\"\n")?;
        write_default_config(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "api_url = \"http://custom\"\n");

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.api_url, "http://custom");
        Ok(())
    }
}
