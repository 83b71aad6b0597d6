use super::options::OptionStore;
use super::ACTIVE_PLUGINS_OPTION;
use crate::datastore::DatastoreError;
use crate::phpser::{self, Value};
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Header scan limit for plugin files.
const HEADER_BYTES: u64 = 8 * 1024;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An installed plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    /// Path relative to the plugins directory, e.g. `akismet/akismet.php`.
    pub file: String,
    pub name: String,
    pub version: String,
}

impl Plugin {
    /// Directory part of `file`, if the plugin lives in one.
    pub fn slug(&self) -> Option<&str> {
        self.file.split_once('/').map(|(dir, _)| dir)
    }
}

/// Installed plugins and their activation state.
pub struct PluginRegistry<'a> {
    plugins_dir: PathBuf,
    options: &'a dyn OptionStore,
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?mi)^[ \t/*#@]*Plugin Name:(.*)$").expect("static pattern"))
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?mi)^[ \t/*#@]*Version:(.*)$").expect("static pattern"))
}

fn header_value(pattern: &Regex, text: &str) -> Option<String> {
    let raw = pattern.captures(text)?.get(1)?.as_str();
    let cleaned = raw.trim().trim_end_matches("*/").trim();
    Some(cleaned.to_string())
}

/// Parse the plugin header from the start of a file.
fn read_header(path: &Path) -> std::io::Result<Option<(String, String)>> {
    let mut buf = Vec::new();
    std::fs::File::open(path)?
        .take(HEADER_BYTES)
        .read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf).replace('\r', "\n");
    let Some(name) = header_value(name_pattern(), &text).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let version = header_value(version_pattern(), &text).unwrap_or_default();
    Ok(Some((name, version)))
}

fn php_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "php") {
            files.push(path);
        }
    }
    Ok(files)
}

impl<'a> PluginRegistry<'a> {
    pub fn new(plugins_dir: impl Into<PathBuf>, options: &'a dyn OptionStore) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            options,
        }
    }

    /// Installed plugins, sorted by file. Looks at `*.php` directly in the
    /// plugins directory and one directory level below it.
    pub fn discover(&self) -> Result<Vec<Plugin>, PluginError> {
        if !self.plugins_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut candidates = php_files(&self.plugins_dir)?;
        for entry in std::fs::read_dir(&self.plugins_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                candidates.extend(php_files(&path)?);
            }
        }

        let mut plugins = Vec::new();
        for path in candidates {
            let Ok(rel) = path.strip_prefix(&self.plugins_dir) else {
                continue;
            };
            let file = rel.to_string_lossy().replace('\\', "/");
            match read_header(&path) {
                Ok(Some((name, version))) => plugins.push(Plugin { file, name, version }),
                Ok(None) => {}
                Err(e) => tracing::debug!(file = %file, error = %e, "unreadable plugin file"),
            }
        }
        plugins.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(plugins)
    }

    /// Active plugin files as stored by the application.
    pub fn active(&self) -> Result<Vec<String>, PluginError> {
        let Some(raw) = self.options.get(ACTIVE_PLUGINS_OPTION)? else {
            return Ok(Vec::new());
        };
        let Some(value) = phpser::try_decode(raw.as_bytes()) else {
            return Ok(Vec::new());
        };
        let files = value
            .members()
            .unwrap_or_default()
            .iter()
            .filter_map(|(_, v)| v.as_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect();
        Ok(files)
    }

    pub fn is_active(&self, file: &str) -> Result<bool, PluginError> {
        Ok(self.active()?.iter().any(|f| f == file))
    }

    fn store_active(&self, mut files: Vec<String>) -> Result<(), PluginError> {
        files.sort();
        files.dedup();
        let value = Value::list(files.iter().map(|f| Value::from(f.as_str())));
        let encoded = String::from_utf8_lossy(&phpser::encode(&value)).into_owned();
        self.options.update(ACTIVE_PLUGINS_OPTION, &encoded)?;
        Ok(())
    }

    /// Mark `file` active. `false` if no such plugin is installed.
    pub fn activate(&self, file: &str) -> Result<bool, PluginError> {
        if !self.discover()?.iter().any(|p| p.file == file) {
            return Ok(false);
        }
        let mut active = self.active()?;
        if !active.iter().any(|f| f == file) {
            active.push(file.to_string());
            self.store_active(active)?;
            tracing::info!(plugin = %file, "plugin activated");
        }
        Ok(true)
    }

    /// Mark `file` inactive. Returns whether it was active.
    pub fn deactivate(&self, file: &str) -> Result<bool, PluginError> {
        let active = self.active()?;
        if !active.iter().any(|f| f == file) {
            return Ok(false);
        }
        let remaining = active.into_iter().filter(|f| f != file).collect();
        self.store_active(remaining)?;
        tracing::info!(plugin = %file, "plugin deactivated");
        Ok(true)
    }

    /// Installed plugin files beginning with `slug`.
    pub fn canonical(&self, slug: &str) -> Result<Vec<String>, PluginError> {
        Ok(self
            .discover()?
            .into_iter()
            .map(|p| p.file)
            .filter(|f| f.starts_with(slug))
            .collect())
    }
}
