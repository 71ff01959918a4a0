//! Core registry types shared by every plugix crate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How a plugin's body is supplied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterfaceType {
    /// Structured document validated against a schema
    #[serde(rename = "yaml_based", alias = "declarative")]
    Declarative,
    /// Loadable code unit with a required call signature
    #[serde(rename = "module_based", alias = "code")]
    Code,
}

impl InterfaceType {
    pub const ALL: [InterfaceType; 2] = [InterfaceType::Declarative, InterfaceType::Code];

    /// Key used for this interface type in index documents
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceType::Declarative => "yaml_based",
            InterfaceType::Code => "module_based",
        }
    }

    /// Parse a top-level index document key
    pub fn from_document_key(key: &str) -> Option<Self> {
        match key {
            "yaml_based" | "declarative" => Some(InterfaceType::Declarative),
            "module_based" | "code" => Some(InterfaceType::Code),
            _ => None,
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a plugin inside one interface
///
/// Most interfaces use a flat name; products are addressed by
/// `(source_name, product_name)`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginKey {
    Name(Arc<str>),
    Product(Arc<str>, Arc<str>),
}

impl PluginKey {
    pub fn name(name: &str) -> Self {
        PluginKey::Name(Arc::from(name))
    }

    pub fn product(source: &str, name: &str) -> Self {
        PluginKey::Product(Arc::from(source), Arc::from(name))
    }

    /// The plugin's own name, without the source part of a product key
    pub fn plugin_name(&self) -> &str {
        match self {
            PluginKey::Name(name) | PluginKey::Product(_, name) => &**name,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            PluginKey::Name(_) => None,
            PluginKey::Product(source, _) => Some(&**source),
        }
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKey::Name(name) => f.write_str(name),
            PluginKey::Product(source, name) => write!(f, "({}, {})", source, name),
        }
    }
}

impl From<&str> for PluginKey {
    fn from(name: &str) -> Self {
        PluginKey::name(name)
    }
}

impl From<(&str, &str)> for PluginKey {
    fn from((source, name): (&str, &str)) -> Self {
        PluginKey::product(source, name)
    }
}

/// Location of one plugin as recorded by the indexer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub interface_type: InterfaceType,
    pub interface_name: Arc<str>,
    pub key: PluginKey,
    pub package: Arc<str>,
    pub relpath: Arc<str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<Arc<str>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<Arc<str>>,
}

impl RegistryEntry {
    pub fn new(
        interface_type: InterfaceType,
        interface_name: &str,
        key: PluginKey,
        package: &str,
        relpath: &str,
    ) -> Self {
        RegistryEntry {
            interface_type,
            interface_name: Arc::from(interface_name),
            key,
            package: Arc::from(package),
            relpath: Arc::from(relpath),
            family: None,
            docstring: None,
        }
    }

    /// `(package, relpath)`, the only index data a descriptor keeps
    pub fn location(&self) -> (&str, &str) {
        (&self.package, &self.relpath)
    }
}
