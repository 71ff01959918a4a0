use crate::registry::PluginRegistry;
use plugix_registry::{InterfaceType, PluginKey, RegistryIndex};
use plugix_schema::{DefaultsProvider, ValidationError};
use serde_json::Value;

/// Resolves `defaults` references through the registry index
///
/// A plugin of interface `products` that names `defaults: Infrared` gets the
/// `Infrared` document of the interface's defaults interface
/// (`product_defaults`), read from the same index snapshot.
pub struct IndexDefaultsProvider<'a> {
    registry: &'a PluginRegistry,
    index: &'a RegistryIndex,
}

impl<'a> IndexDefaultsProvider<'a> {
    pub fn new(registry: &'a PluginRegistry, index: &'a RegistryIndex) -> Self {
        IndexDefaultsProvider { registry, index }
    }
}

impl DefaultsProvider for IndexDefaultsProvider<'_> {
    fn resolve_defaults(&self, interface: &str, name: &str) -> Result<Value, ValidationError> {
        let not_found = || ValidationError::DefaultsNotFound {
            interface: interface.to_string(),
            name: name.to_string(),
        };

        let defaults_interface = self
            .registry
            .catalog()
            .get(interface)
            .and_then(|definition| definition.defaults_interface.clone())
            .ok_or_else(not_found)?;
        let entry = self
            .index
            .lookup(
                InterfaceType::Declarative,
                &defaults_interface,
                &PluginKey::name(name),
            )
            .ok_or_else(not_found)?;

        let path = self.registry.roots().abspath(&entry.package, &entry.relpath);
        self.registry
            .documents()
            .load(&path)
            .map_err(|e| ValidationError::DefaultsUnavailable {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}
