//! File-based settings
//!
//! Every field is optional in the YAML file; missing ones take defaults.
//!
//! ```yaml
//! db_path: /srv/consultaties/consultatie.db
//! request_delay_ms: 1000
//! shingle_size: 4
//! similarity_threshold: 0.4
//! ```

use crate::similarity::{
    ClusterConfig, ConfigError, ShingleUnit, DEFAULT_SHINGLE_SIZE, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::source::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "consultatie";
const CONFIG_FILE: &str = "config.yaml";
const DB_FILE: &str = "consultatie.db";

/// Errors loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Clustering(#[from] ConfigError),
}

/// Result type for settings
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Settings for a collector installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub db_path: Option<PathBuf>,
    pub attachments_dir: Option<PathBuf>,
    pub html_dir: Option<PathBuf>,
    pub base_url: String,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub shingle_size: usize,
    pub similarity_threshold: f64,
    pub shingle_unit: ShingleUnit,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            attachments_dir: None,
            html_dir: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_delay_ms: 500,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            shingle_size: DEFAULT_SHINGLE_SIZE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            shingle_unit: ShingleUnit::Word,
        }
    }
}

/// `~/.local/share/consultatie` or the platform equivalent
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
        .join(APP_DIR)
}

impl HarvestConfig {
    /// Parse settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| SettingsError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Settings from the data directory's `config.yaml`, or defaults when
    /// there is none
    pub fn discover() -> SettingsResult<Self> {
        let path = data_dir().join(CONFIG_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| data_dir().join(DB_FILE))
    }

    /// Configured attachment directory, else `attachments/` beside the database
    pub fn attachments_dir(&self) -> PathBuf {
        self.attachments_dir
            .clone()
            .unwrap_or_else(|| self.sibling_of_db("attachments"))
    }

    /// Configured page archive directory, else `html/` beside the database
    pub fn html_dir(&self) -> PathBuf {
        self.html_dir.clone().unwrap_or_else(|| self.sibling_of_db("html"))
    }

    fn sibling_of_db(&self, name: &str) -> PathBuf {
        let db = self.db_path();
        match db.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validated clustering parameters
    pub fn cluster_config(&self) -> SettingsResult<ClusterConfig> {
        let config = ClusterConfig::new(self.shingle_size, self.similarity_threshold)?;
        Ok(config.with_unit(self.shingle_unit))
    }
}
