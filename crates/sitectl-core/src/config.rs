//! Endpoint configuration.
//!
//! Loaded from a YAML file, then overridden from `SITECTL_*` environment
//! variables. Relative paths resolve against the directory of the file.

use crate::auth::{Secret, TagAlgorithm, ValidityWindow, DEFAULT_WINDOW_SECS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TABLE_PREFIX: &str = "app_";
pub const DEFAULT_CONTENT_DIR: &str = "content";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Shared secret. Absent means no request can authenticate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Start of the validity window. Defaults to the config file's mtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    pub window_secs: u64,
    pub tag_algorithm: TagAlgorithm,
    pub site_root: PathBuf,
    pub content_dir: PathBuf,
    /// SQLite file of the managed application.
    pub database: PathBuf,
    pub table_prefix: String,
    /// SQLite file holding credential counters.
    pub state_db: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// File name left out of `findfiles` listings at depth -2.
    pub endpoint_file: String,

    /// File this config was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            secret: None,
            issued_at: None,
            window_secs: DEFAULT_WINDOW_SECS,
            tag_algorithm: TagAlgorithm::default(),
            site_root: PathBuf::from("."),
            content_dir: PathBuf::from(DEFAULT_CONTENT_DIR),
            database: PathBuf::from("site.db"),
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            state_db: PathBuf::from("sitectl-state.db"),
            app_version: None,
            endpoint_file: "sitectl.yaml".to_string(),
            source: None,
        }
    }
}

impl EndpointConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_yaml(&text)?;
        cfg.source = Some(path.to_path_buf());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var("SITECTL_SECRET") {
            self.secret = Some(v);
        }
        if let Ok(v) = env::var("SITECTL_SITE_ROOT") {
            self.site_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SITECTL_DATABASE") {
            self.database = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SITECTL_STATE_DB") {
            self.state_db = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SITECTL_TABLE_PREFIX") {
            self.table_prefix = v;
        }
        if let Ok(v) = env::var("SITECTL_TAG_ALGORITHM") {
            self.tag_algorithm = v.parse().map_err(ConfigError::Invalid)?;
        }
        if let Ok(v) = env::var("SITECTL_WINDOW_SECS") {
            self.window_secs = v
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("SITECTL_WINDOW_SECS is not a number: {v}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_prefix.is_empty() {
            return Err(ConfigError::Invalid("table_prefix must not be empty".into()));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Invalid("window_secs must be positive".into()));
        }
        if matches!(&self.secret, Some(s) if s.is_empty()) {
            return Err(ConfigError::Invalid("secret must not be empty".into()));
        }
        Ok(())
    }

    pub fn secret(&self) -> Option<Secret> {
        self.secret.as_deref().map(Secret::new)
    }

    /// Validity window: `issued_at`, else the config file's modification
    /// time. `None` when neither is known.
    pub fn window(&self) -> Option<ValidityWindow> {
        let issued_at = match self.issued_at {
            Some(at) => at,
            None => {
                let modified = std::fs::metadata(self.source.as_ref()?).ok()?.modified().ok()?;
                DateTime::<Utc>::from(modified)
            }
        };
        Some(ValidityWindow::new(issued_at, self.window_secs))
    }

    fn base_dir(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn site_root_path(&self) -> PathBuf {
        self.resolve(&self.site_root)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database)
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.resolve(&self.state_db)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_yaml()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
