use crate::poller::DEFAULT_POLL_INTERVAL_MS;
use crate::shared::ids::RepositoryRef;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const GLOBAL_STATE_DIR: &str = ".worklink";
pub const GLOBAL_SETTINGS_FILE_NAME: &str = "config.yaml";
pub const HISTORY_DB_FILE_NAME: &str = "history.sqlite";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("settings validation failed: {0}")]
    Settings(String),
    #[error("failed to resolve home directory for global config path")]
    HomeDirectoryUnavailable,
}

fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Operator-editable settings, loaded from `~/.worklink/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub api_base_url: String,
    pub repository_ref: String,
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    #[serde(default)]
    pub state_root: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&global_settings_path()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Settings(
                "api_base_url must be non-empty".to_string(),
            ));
        }
        RepositoryRef::parse(&self.repository_ref).map_err(ConfigError::Settings)?;
        if self.polling_interval_ms == 0 {
            return Err(ConfigError::Settings(
                "polling_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the controller log and the history database.
    pub fn resolve_state_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.state_root {
            Some(root) => Ok(root.clone()),
            None => global_state_root(),
        }
    }

    pub fn history_db_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.resolve_state_root()?.join(HISTORY_DB_FILE_NAME))
    }
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    std::env::var_os("HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::HomeDirectoryUnavailable)
}

pub fn global_state_root() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join(GLOBAL_STATE_DIR))
}

pub fn global_settings_path() -> Result<PathBuf, ConfigError> {
    Ok(global_state_root()?.join(GLOBAL_SETTINGS_FILE_NAME))
}
