//! On-disk registry index documents
//!
//! A document is a nested mapping
//! `interface_type -> interface_name -> plugin_key -> {package, relpath}`.
//! Product interfaces nest one level deeper, `source -> name -> entry`.
//! JSON and YAML encodings are both accepted; the file extension decides.

use crate::errors::RegistryError;
use crate::types::{InterfaceType, PluginKey, RegistryEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Encoding of an index document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexFormat {
    #[default]
    Json,
    Yaml,
}

impl IndexFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(IndexFormat::Json),
            Some("yaml" | "yml") => Some(IndexFormat::Yaml),
            _ => None,
        }
    }

    /// Parse the name used on the indexer command line (`-s yaml`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(IndexFormat::Json),
            "yaml" | "yml" => Some(IndexFormat::Yaml),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexFormat::Json => "json",
            IndexFormat::Yaml => "yaml",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Parse document text into a generic value
    pub fn parse_value(&self, content: &str) -> Result<Value, String> {
        match self {
            IndexFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            IndexFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }

    pub fn render<T: Serialize>(&self, value: &T) -> Result<String, String> {
        match self {
            IndexFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            IndexFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEntry {
    package: String,
    relpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    docstring: Option<String>,
}

impl RawEntry {
    fn into_entry(
        self,
        interface_type: InterfaceType,
        interface_name: &str,
        key: PluginKey,
    ) -> RegistryEntry {
        let mut entry =
            RegistryEntry::new(interface_type, interface_name, key, &self.package, &self.relpath);
        entry.family = self.family.as_deref().map(Arc::from);
        entry.docstring = self.docstring.as_deref().map(Arc::from);
        entry
    }

    fn from_entry(entry: &RegistryEntry) -> Self {
        RawEntry {
            package: entry.package.to_string(),
            relpath: entry.relpath.to_string(),
            family: entry.family.as_ref().map(|f| f.to_string()),
            docstring: entry.docstring.as_ref().map(|d| d.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawNode {
    Entry(RawEntry),
    Nested(BTreeMap<String, RawEntry>),
}

type RawInterfaces = BTreeMap<String, BTreeMap<String, RawNode>>;

/// Read and parse one index document
///
/// A missing file is reported as [`RegistryError::NeedsRebuild`] so the caller
/// can run the indexer instead of failing outright.
pub fn read_document(path: &Path) -> Result<Vec<RegistryEntry>, RegistryError> {
    let format = IndexFormat::from_path(path)
        .ok_or_else(|| RegistryError::corrupt(path, "unsupported file extension"))?;

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RegistryError::NeedsRebuild {
                reason: format!("{} does not exist", path.display()),
            });
        }
        Err(e) => return Err(RegistryError::io(path, e)),
    };

    parse_document(&content, format, path)
}

/// Parse document text; `origin` is only used in error messages
pub fn parse_document(
    content: &str,
    format: IndexFormat,
    origin: &Path,
) -> Result<Vec<RegistryEntry>, RegistryError> {
    let value = format
        .parse_value(content)
        .map_err(|e| RegistryError::corrupt(origin, e))?;

    let Value::Object(top) = value else {
        return Err(RegistryError::corrupt(
            origin,
            "top level must be a mapping of interface types",
        ));
    };

    let mut entries = Vec::new();
    for (type_key, interfaces) in top {
        let Some(interface_type) = InterfaceType::from_document_key(&type_key) else {
            warn!(
                "Skipping unknown interface type '{}' in {}",
                type_key,
                origin.display()
            );
            continue;
        };

        let interfaces: RawInterfaces = serde_json::from_value(interfaces)
            .map_err(|e| RegistryError::corrupt(origin, format!("{}: {}", type_key, e)))?;

        for (interface_name, nodes) in interfaces {
            for (key, node) in nodes {
                match node {
                    RawNode::Entry(raw) => entries.push(raw.into_entry(
                        interface_type,
                        &interface_name,
                        PluginKey::name(&key),
                    )),
                    RawNode::Nested(by_name) => {
                        for (name, raw) in by_name {
                            entries.push(raw.into_entry(
                                interface_type,
                                &interface_name,
                                PluginKey::product(&key, &name),
                            ));
                        }
                    }
                }
            }
        }
    }

    debug!(
        "Parsed {} registry entries from {}",
        entries.len(),
        origin.display()
    );
    Ok(entries)
}

/// Render entries back into the nested document shape
pub fn render_document<'a>(
    entries: impl IntoIterator<Item = &'a RegistryEntry>,
    format: IndexFormat,
) -> Result<String, RegistryError> {
    let mut document: BTreeMap<&'static str, RawInterfaces> = BTreeMap::new();

    for entry in entries {
        let nodes = document
            .entry(entry.interface_type.as_str())
            .or_default()
            .entry(entry.interface_name.to_string())
            .or_default();

        match &entry.key {
            PluginKey::Name(name) => {
                nodes.insert(name.to_string(), RawNode::Entry(RawEntry::from_entry(entry)));
            }
            PluginKey::Product(source, name) => {
                let node = nodes
                    .entry(source.to_string())
                    .or_insert_with(|| RawNode::Nested(BTreeMap::new()));
                match node {
                    RawNode::Nested(by_name) => {
                        by_name.insert(name.to_string(), RawEntry::from_entry(entry));
                    }
                    RawNode::Entry(_) => warn!(
                        "Key '{}' of interface '{}' is both a plugin and a product source; skipping {}",
                        source, entry.interface_name, entry.key
                    ),
                }
            }
        }
    }

    format.render(&document).map_err(RegistryError::Serialize)
}

/// Write entries to `path` atomically (temp file, then rename)
pub fn write_document<'a>(
    path: &Path,
    entries: impl IntoIterator<Item = &'a RegistryEntry>,
    format: IndexFormat,
) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
    }

    let content = render_document(entries, format)?;

    let temp_path = path.with_extension(format!("{}.tmp", format.extension()));
    {
        let file = fs::File::create(&temp_path).map_err(|e| RegistryError::io(&temp_path, e))?;
        let mut writer = io::BufWriter::with_capacity(64 * 1024, file);
        writer
            .write_all(content.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| RegistryError::io(&temp_path, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| RegistryError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "module_based": {"readers": {"foo": {"package": "pkgA", "relpath": "r/foo.ext"}}},
        "yaml_based": {
            "products": {"viirs": {"Infrared": {"package": "pkgB", "relpath": "products/viirs.yaml"}}},
            "sectors": {"conus": {"package": "pkgB", "relpath": "sectors/conus.yaml", "family": "area_definition_static"}}
        },
        "text_based": {"tpw": {}}
    }"#;

    fn origin() -> PathBuf {
        PathBuf::from("registered_plugins.json")
    }

    #[test]
    fn test_parse_flat_and_product_entries() {
        let entries = parse_document(SAMPLE, IndexFormat::Json, &origin());
        let Ok(entries) = entries else {
            panic!("sample document should parse");
        };
        assert_eq!(entries.len(), 3);

        let reader = entries
            .iter()
            .find(|e| e.interface_type == InterfaceType::Code)
            .map(|e| (e.key.clone(), e.package.to_string()));
        assert_eq!(reader, Some((PluginKey::name("foo"), "pkgA".to_string())));

        assert!(entries
            .iter()
            .any(|e| e.key == PluginKey::product("viirs", "Infrared")));
        assert!(entries
            .iter()
            .any(|e| e.family.as_deref() == Some("area_definition_static")));
    }

    #[test]
    fn test_malformed_document_is_corrupt() {
        let result = parse_document("{\"module_based\": [1, 2]}", IndexFormat::Json, &origin());
        assert!(matches!(result, Err(RegistryError::Corrupt { .. })));

        let result = parse_document("not: [valid", IndexFormat::Yaml, &origin());
        assert!(matches!(result, Err(RegistryError::Corrupt { .. })));

        let result = parse_document(
            "{\"module_based\": {\"readers\": {\"foo\": {\"relpath\": \"x\"}}}}",
            IndexFormat::Json,
            &origin(),
        );
        assert!(matches!(result, Err(RegistryError::Corrupt { .. })));
    }

    #[test]
    fn test_missing_document_needs_rebuild() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let result = read_document(&temp_dir.path().join("registered_plugins.json"));
        assert!(result.is_err_and(|e| e.needs_rebuild()));
    }

    #[test]
    fn test_write_yaml_and_read_back() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Ok(entries) = parse_document(SAMPLE, IndexFormat::Json, &origin()) else {
            panic!("sample document should parse");
        };

        let path = temp_dir.path().join("out").join("registered_plugins.yaml");
        assert!(write_document(&path, &entries, IndexFormat::Yaml).is_ok());

        let reread = read_document(&path);
        assert!(reread.is_ok_and(|mut reread| {
            reread.sort_by(|a, b| a.key.cmp(&b.key));
            let mut expected = entries.clone();
            expected.sort_by(|a, b| a.key.cmp(&b.key));
            reread == expected
        }));
    }
}
