//! Loading plugin bodies
//!
//! The resolver only sees these interfaces. Declarative documents are read
//! from disk on every call; code units come from a [`CodeLoader`], which for
//! plugix is the compiled-in [`StaticCodeRegistry`].

use crate::errors::LoadError;
use plugix_contract::PluginDefinition;
use plugix_registry::IndexFormat;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Reads declarative plugin documents
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    /// Parse the document at `path`; JSON by extension, YAML otherwise
    pub fn load(&self, path: &Path) -> Result<Value, LoadError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                LoadError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let format = IndexFormat::from_path(path).unwrap_or(IndexFormat::Yaml);
        debug!("Loading {} plugin document {}", format.as_str(), path.display());
        format
            .parse_value(&content)
            .map_err(|message| LoadError::Parse {
                path: path.to_path_buf(),
                message,
            })
    }
}

/// Source of code-defined plugins
pub trait CodeLoader: Send + Sync + fmt::Debug {
    /// The definition registered for `(package, relpath)`
    fn load(&self, package: &str, relpath: &str) -> Result<PluginDefinition, LoadError>;
}

/// Code units compiled into the binary, keyed by `(package, relpath)`
#[derive(Debug, Clone, Default)]
pub struct StaticCodeRegistry {
    units: BTreeMap<(String, String), PluginDefinition>,
}

impl StaticCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, package: &str, relpath: &str, definition: PluginDefinition) -> &mut Self {
        self.units
            .insert((package.to_string(), relpath.to_string()), definition);
        self
    }

    pub fn with(mut self, package: &str, relpath: &str, definition: PluginDefinition) -> Self {
        self.register(package, relpath, definition);
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Registered `(package, relpath)` pairs, sorted
    pub fn locations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units
            .keys()
            .map(|(package, relpath)| (package.as_str(), relpath.as_str()))
    }
}

impl CodeLoader for StaticCodeRegistry {
    fn load(&self, package: &str, relpath: &str) -> Result<PluginDefinition, LoadError> {
        self.units
            .get(&(package.to_string(), relpath.to_string()))
            .cloned()
            .ok_or_else(|| LoadError::NoCodeUnit {
                package: package.to_string(),
                relpath: relpath.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugix_contract::CodeUnit;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml_and_json_documents() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let yaml = temp_dir.path().join("foo.yaml");
        let json_doc = temp_dir.path().join("bar.json");
        let _ = fs::write(&yaml, "interface: sectors\nname: foo\nspec:\n  res: 2\n");
        let _ = fs::write(&json_doc, r#"{"interface": "sectors", "name": "bar"}"#);

        let loader = DocumentLoader;
        assert!(loader
            .load(&yaml)
            .is_ok_and(|doc| doc["spec"]["res"] == json!(2)));
        assert!(loader.load(&json_doc).is_ok_and(|doc| doc["name"] == json!("bar")));
    }

    #[test]
    fn test_missing_and_malformed_documents() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let loader = DocumentLoader;
        let missing = loader.load(&temp_dir.path().join("gone.yaml"));
        assert!(missing.is_err_and(|e| e.is_missing()));

        let broken = temp_dir.path().join("broken.json");
        let _ = fs::write(&broken, "{ not json");
        assert!(matches!(loader.load(&broken), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_static_registry_lookup() {
        let registry = StaticCodeRegistry::new().with(
            "core",
            "plugins/readers/foo",
            PluginDefinition::new(CodeUnit::new().name("foo")),
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.load("core", "plugins/readers/foo").is_ok());
        assert!(registry
            .load("core", "plugins/readers/bar")
            .is_err_and(|e| e.is_missing()));
    }
}
