//! How resolver keys map onto index keys and plugin documents

use plugix_contract::KeyShape;
use plugix_registry::PluginKey;
use plugix_schema::{ValidationEngine, ValidationError, LIST_FAMILY};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Key handling of one resolver flavor
pub trait KeyStrategy: Send + Sync + fmt::Debug {
    /// Index key shape this strategy works with
    fn shape(&self) -> KeyShape;

    fn accepts(&self, key: &PluginKey) -> bool {
        matches!(
            (self.shape(), key),
            (KeyShape::Flat, PluginKey::Name(_)) | (KeyShape::SourceAndName, PluginKey::Product(..))
        )
    }

    /// The document for `key` out of the file the index points at
    ///
    /// `None` means the file does not contain the plugin.
    fn select(&self, document: Value, key: &PluginKey) -> Result<Option<Value>, ValidationError>;
}

/// Plugins keyed by name; one document per file
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatKeys;

impl KeyStrategy for FlatKeys {
    fn shape(&self) -> KeyShape {
        KeyShape::Flat
    }

    fn select(&self, document: Value, _key: &PluginKey) -> Result<Option<Value>, ValidationError> {
        Ok(Some(document))
    }
}

/// Products keyed by `(source_name, product_name)`
///
/// Product files usually hold a `list` document with many products, each
/// naming the sources it applies to in `source_names`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductKeys;

impl ProductKeys {
    fn matches(item: &Value, source: &str, name: &str) -> bool {
        let named = item.get("name").and_then(Value::as_str) == Some(name);
        let sources = item
            .get("source_names")
            .or_else(|| item.get("spec").and_then(|spec| spec.get("source_names")));
        let has_source = sources
            .and_then(Value::as_array)
            .is_some_and(|sources| sources.iter().any(|s| s.as_str() == Some(source)));
        named && has_source
    }
}

impl KeyStrategy for ProductKeys {
    fn shape(&self) -> KeyShape {
        KeyShape::SourceAndName
    }

    fn select(&self, document: Value, key: &PluginKey) -> Result<Option<Value>, ValidationError> {
        let PluginKey::Product(source, name) = key else {
            return Ok(None);
        };

        if document.get("family").and_then(Value::as_str) != Some(LIST_FAMILY) {
            return Ok(Self::matches(&document, source, name).then_some(document));
        }

        let items = ValidationEngine::list_items(&document)?;
        let found = items
            .into_iter()
            .find(|item| Self::matches(item, source, name));
        if found.is_none() {
            debug!("No product {} in list document", key);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product_list() -> Value {
        json!({
            "interface": "products",
            "family": "list",
            "name": "abi",
            "docstring": "ABI products",
            "package": "core",
            "relpath": "plugins/yaml/products/abi.yaml",
            "spec": {"products": [
                {"name": "Infrared", "source_names": ["abi", "ahi"], "docstring": "IR", "family": "algorithm", "spec": {}},
                {"name": "Visible", "source_names": ["abi"], "docstring": "VIS", "family": "algorithm", "spec": {}},
            ]}
        })
    }

    #[test]
    fn test_flat_keys_accept_names_only() {
        assert!(FlatKeys.accepts(&PluginKey::name("foo")));
        assert!(!FlatKeys.accepts(&PluginKey::product("abi", "foo")));
        assert!(ProductKeys.accepts(&PluginKey::product("abi", "foo")));
    }

    #[test]
    fn test_product_selected_by_source_and_name() {
        let key = PluginKey::product("ahi", "Infrared");
        let selected = ProductKeys.select(product_list(), &key);
        let Ok(Some(item)) = selected else {
            panic!("Infrared should be selected for ahi");
        };
        assert_eq!(item["package"], json!("core"));
        assert_eq!(item["interface"], json!("products"));

        let wrong_source = ProductKeys.select(product_list(), &PluginKey::product("ahi", "Visible"));
        assert!(matches!(wrong_source, Ok(None)));
    }
}
