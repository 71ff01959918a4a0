//! YAML-sourced, JSON-cached artifacts
//!
//! Any file-backed cache follows the same rule: when the cache is absent or
//! older than its declarative source, re-derive it from the source and rewrite
//! it; otherwise read the cached form directly.

use crate::errors::RegistryError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Modification time of `path`, if it exists and the platform reports one
pub fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Whether `cache` has to be regenerated from `source`
///
/// A cache without a source is served as-is.
pub fn is_stale(cache: &Path, source: &Path) -> bool {
    match (mtime(cache), mtime(source)) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(cache_time), Some(source_time)) => cache_time < source_time,
    }
}

/// Load `T` through the cache, regenerating it when stale
pub fn load_cached<T>(source_yaml: &Path, cache_json: &Path) -> Result<T, RegistryError>
where
    T: DeserializeOwned + Serialize,
{
    if !is_stale(cache_json, source_yaml) {
        match read_json(cache_json) {
            Ok(value) => {
                debug!("Using cached {}", cache_json.display());
                return Ok(value);
            }
            Err(e) => warn!("Ignoring unreadable cache {}: {}", cache_json.display(), e),
        }
    }

    let value: T = read_yaml(source_yaml)?;
    if let Err(e) = write_json(cache_json, &value) {
        warn!("Could not refresh cache {}: {}", cache_json.display(), e);
    } else {
        debug!(
            "Regenerated {} from {}",
            cache_json.display(),
            source_yaml.display()
        );
    }
    Ok(value)
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let content = fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
    serde_yaml::from_str(&content).map_err(|e| RegistryError::corrupt(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let content = fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| RegistryError::corrupt(path, e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
    }
    let content =
        serde_json::to_string(value).map_err(|e| RegistryError::Serialize(e.to_string()))?;

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&temp_path).map_err(|e| RegistryError::io(&temp_path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| RegistryError::io(&temp_path, e))?;
    }
    fs::rename(&temp_path, path).map_err(|e| RegistryError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;

    type Help = BTreeMap<String, String>;

    fn set_mtime(path: &Path, time: SystemTime) {
        if let Ok(file) = fs::OpenOptions::new().write(true).open(path) {
            let _ = file.set_modified(time);
        }
    }

    #[test]
    fn test_absent_cache_is_stale() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = temp_dir.path().join("help.yaml");
        let cache = temp_dir.path().join("help.json");
        let _ = fs::write(&source, "list: show plugins\n");

        assert!(is_stale(&cache, &source));
        let loaded: Result<Help, _> = load_cached(&source, &cache);
        assert!(loaded.is_ok_and(|help| help.get("list").map(String::as_str) == Some("show plugins")));
        assert!(cache.exists());
        assert!(!is_stale(&cache, &source));
    }

    #[test]
    fn test_fresh_cache_is_read_directly() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = temp_dir.path().join("help.yaml");
        let cache = temp_dir.path().join("help.json");
        let _ = fs::write(&source, "list: from yaml\n");
        let _ = fs::write(&cache, r#"{"list": "from cache"}"#);
        let now = SystemTime::now();
        set_mtime(&source, now - Duration::from_secs(120));
        set_mtime(&cache, now);

        let loaded: Result<Help, _> = load_cached(&source, &cache);
        assert!(loaded.is_ok_and(|help| help.get("list").map(String::as_str) == Some("from cache")));
    }

    #[test]
    fn test_older_cache_is_regenerated() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = temp_dir.path().join("help.yaml");
        let cache = temp_dir.path().join("help.json");
        let _ = fs::write(&cache, r#"{"list": "outdated"}"#);
        let _ = fs::write(&source, "list: current\n");
        let now = SystemTime::now();
        set_mtime(&cache, now - Duration::from_secs(120));
        set_mtime(&source, now);

        assert!(is_stale(&cache, &source));
        let loaded: Result<Help, _> = load_cached(&source, &cache);
        assert!(loaded.is_ok_and(|help| help.get("list").map(String::as_str) == Some("current")));

        let rewritten = fs::read_to_string(&cache).unwrap_or_default();
        assert!(rewritten.contains("current"));
    }

    #[test]
    fn test_cache_without_source_is_served() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let source = temp_dir.path().join("missing.yaml");
        let cache = temp_dir.path().join("help.json");
        let _ = fs::write(&cache, r#"{"list": "cached only"}"#);

        assert!(!is_stale(&cache, &source));
        let loaded: Result<Help, _> = load_cached(&source, &cache);
        assert!(loaded.is_ok());
    }
}
