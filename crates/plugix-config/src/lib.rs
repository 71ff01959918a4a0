//! Configuration management for plugix
//!
//! The configuration lives in a single TOML file. Its location is resolved in
//! this order:
//! 1. `$PLUGIX_CONFIG` when set and non-empty
//! 2. the path stored in the pointer file `.plugix_config_path` next to the default
//! 3. `~/.config/plugix/plugix.toml` (`AppData` on Windows)
//!
//! Relative paths inside the file are resolved against the file's directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "PLUGIX_CONFIG";
pub const CONFIG_FILE_NAME: &str = "plugix.toml";
pub const POINTER_FILE_NAME: &str = ".plugix_config_path";

/// Executable invoked to regenerate registry index documents
pub const DEFAULT_INDEXER: &str = "create_plugin_registries";
pub const DEFAULT_REBUILD_TIMEOUT_SECS: u64 = 120;

/// Keys accepted by `get`/`set`, in display order
pub const KNOWN_KEYS: &[&str] = &[
    "index-dir",
    "plugin-root",
    "schema-dir",
    "cache-path",
    "indexer",
    "index-format",
    "rebuild-timeout-secs",
    "rebuild-on-miss",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key: {0}. Supported keys: {keys}", keys = KNOWN_KEYS.join(", "))]
    UnknownKey(String),

    #[error("Invalid value '{value}' for config key '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("Indexer executable '{0}' not found on PATH")]
    IndexerNotFound(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_on_miss: Option<bool>,
    /// Package name -> installation root
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, String>,
    /// Interface name -> document field that selects its validator instead of `family`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validator_keys: BTreeMap<String, String>,

    /// Directory of the file this config was read from
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Config {
    pub fn path() -> PathBuf {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        let default = default_config_dir().join(CONFIG_FILE_NAME);

        if let Some(parent) = default.parent() {
            let pointer = parent.join(POINTER_FILE_NAME);
            if let Ok(contents) = fs::read_to_string(&pointer) {
                let trimmed = contents.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
        }

        default
    }

    /// Path of the pointer file that redirects the default config location
    pub fn pointer_path() -> PathBuf {
        default_config_dir().join(POINTER_FILE_NAME)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::path())
    }

    /// Load config from a specific path, returning defaults if it doesn't exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str::<Config>(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Config::default()
        };
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "index-dir" => self.index_dir.clone(),
            "plugin-root" => self.plugin_root.clone(),
            "schema-dir" => self.schema_dir.clone(),
            "cache-path" => self.cache_path.clone(),
            "indexer" => self.indexer.clone(),
            "index-format" => self.index_format.clone(),
            "rebuild-timeout-secs" => self.rebuild_timeout_secs.map(|v| v.to_string()),
            "rebuild-on-miss" => self.rebuild_on_miss.map(|v| v.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        let invalid = |value: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "index-dir" => self.index_dir = Some(value),
            "plugin-root" => self.plugin_root = Some(value),
            "schema-dir" => self.schema_dir = Some(value),
            "cache-path" => self.cache_path = Some(value),
            "indexer" => self.indexer = Some(value),
            "index-format" => match value.as_str() {
                "json" | "yaml" => self.index_format = Some(value),
                _ => return Err(invalid(&value)),
            },
            "rebuild-timeout-secs" => {
                let secs = value.parse::<u64>().map_err(|_| invalid(&value))?;
                self.rebuild_timeout_secs = Some(secs);
            }
            "rebuild-on-miss" => {
                let flag = value.parse::<bool>().map_err(|_| invalid(&value))?;
                self.rebuild_on_miss = Some(flag);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        KNOWN_KEYS.iter().all(|key| self.get(key).is_none())
            && self.packages.is_empty()
            && self.validator_keys.is_empty()
    }

    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        KNOWN_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    /// Resolve a configured path relative to the config file's directory
    fn resolve(&self, value: &str) -> PathBuf {
        let path = PathBuf::from(value);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    pub fn get_cache_path(&self) -> PathBuf {
        match &self.cache_path {
            Some(p) => self.resolve(p),
            None => default_cache_dir(),
        }
    }

    /// Directory holding merged or per-package registry index documents
    pub fn get_index_dir(&self) -> PathBuf {
        match &self.index_dir {
            Some(p) => self.resolve(p),
            None => default_cache_dir().join("index"),
        }
    }

    /// Root under which packages without an explicit entry are installed
    pub fn get_plugin_root(&self) -> PathBuf {
        match &self.plugin_root {
            Some(p) => self.resolve(p),
            None => dirs::data_dir().map_or_else(
                || PathBuf::from(".local/share/plugix/packages"),
                |d| d.join("plugix").join("packages"),
            ),
        }
    }

    pub fn get_schema_dir(&self) -> PathBuf {
        match &self.schema_dir {
            Some(p) => self.resolve(p),
            None => default_config_dir().join("schemas"),
        }
    }

    /// Explicit package roots with relative entries resolved
    pub fn package_roots(&self) -> BTreeMap<String, PathBuf> {
        self.packages
            .iter()
            .map(|(name, root)| (name.clone(), self.resolve(root)))
            .collect()
    }

    /// Interfaces whose validator is keyed by a document sub-kind field
    pub fn validator_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.validator_keys
            .iter()
            .filter(|(_, field)| !field.trim().is_empty())
            .map(|(interface, field)| (interface.as_str(), field.trim()))
    }

    pub fn get_indexer(&self) -> String {
        self.indexer
            .clone()
            .unwrap_or_else(|| DEFAULT_INDEXER.to_string())
    }

    /// Resolve the indexer to an executable path
    ///
    /// Paths containing a separator are used as-is (relative to the config
    /// file), bare names are looked up on `PATH`.
    pub fn resolve_indexer(&self) -> Result<PathBuf, ConfigError> {
        let indexer = self.get_indexer();
        if indexer.contains(std::path::MAIN_SEPARATOR) || indexer.contains('/') {
            return Ok(self.resolve(&indexer));
        }
        which::which(&indexer).map_err(|_| ConfigError::IndexerNotFound(indexer))
    }

    pub fn get_index_format(&self) -> Option<&str> {
        self.index_format.as_deref()
    }

    pub fn rebuild_timeout(&self) -> Duration {
        Duration::from_secs(
            self.rebuild_timeout_secs
                .unwrap_or(DEFAULT_REBUILD_TIMEOUT_SECS),
        )
    }

    pub fn rebuild_on_miss(&self) -> bool {
        self.rebuild_on_miss.unwrap_or(true)
    }

    /// Create the cache directory if needed
    pub fn ensure_cache_path(&self) -> Result<PathBuf, ConfigError> {
        let cache = self.get_cache_path();
        fs::create_dir_all(&cache).map_err(|source| ConfigError::Io {
            path: cache.clone(),
            source,
        })?;
        Ok(cache)
    }
}

fn default_config_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir().map_or_else(
            || PathBuf::from(".config/plugix"),
            |h| h.join(".config").join("plugix"),
        )
    }

    #[cfg(target_os = "windows")]
    {
        dirs::config_dir().map_or_else(
            || PathBuf::from("config\\plugix"),
            |c| c.join("plugix"),
        )
    }
}

fn default_cache_dir() -> PathBuf {
    #[cfg(not(target_os = "windows"))]
    {
        dirs::home_dir().map_or_else(
            || PathBuf::from(".cache/plugix"),
            |h| h.join(".cache").join("plugix"),
        )
    }

    #[cfg(target_os = "windows")]
    {
        dirs::cache_dir().map_or_else(
            || PathBuf::from("cache\\plugix"),
            |c| c.join("plugix"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let config = Config::load_from_path(&temp_dir.path().join("absent.toml"));
        assert!(config.is_ok_and(|c| c.is_empty() && c.rebuild_on_miss()));
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        let content = r#"
index_dir = "index"
plugin_root = "/opt/plugins"
rebuild_timeout_secs = 5

[packages]
pkgA = "pkgs/pkgA"

[validator_keys]
sectors = "sector_type"
feature_annotators = " "
"#;
        assert!(fs::write(&path, content).is_ok());

        let Ok(config) = Config::load_from_path(&path) else {
            panic!("config should parse");
        };
        assert_eq!(config.get_index_dir(), temp_dir.path().join("index"));
        assert_eq!(config.get_plugin_root(), PathBuf::from("/opt/plugins"));
        assert_eq!(config.rebuild_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.package_roots().get("pkgA"),
            Some(&temp_dir.path().join("pkgs/pkgA"))
        );
        assert_eq!(
            config.validator_keys().collect::<Vec<_>>(),
            vec![("sectors", "sector_type")]
        );
    }

    #[test]
    fn test_set_validates_values() {
        let mut config = Config::default();
        assert!(config.set("index-format", "yaml".to_string()).is_ok());
        assert!(matches!(
            config.set("index-format", "xml".to_string()),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("rebuild-on-miss", "sometimes".to_string()),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("verbosity", "3".to_string()),
            Err(ConfigError::UnknownKey(_))
        ));
        assert_eq!(config.values_iter(), vec![("index-format", "yaml".to_string())]);
    }

    #[test]
    fn test_save_round_trip() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = Config::default();
        assert!(config.set("indexer", "bin/indexer".to_string()).is_ok());
        assert!(config.save_to_path(&path).is_ok());

        let loaded = Config::load_from_path(&path);
        assert!(loaded.is_ok_and(|c| c.get_indexer() == "bin/indexer"
            && c.resolve_indexer().ok() == Some(temp_dir.path().join("nested/bin/indexer"))));
    }
}
