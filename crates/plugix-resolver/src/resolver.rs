//! Self-healing plugin lookup for one interface
//!
//! A lookup that misses (plugin not in the index, or the file it points at is
//! gone) runs the indexer once, reloads the index and retries with rebuilds
//! disabled. The miss is final after that.

use crate::defaults::IndexDefaultsProvider;
use crate::descriptor::{PluginBody, PluginDescriptor};
use crate::errors::{LoadError, ResolveError};
use crate::keys::{FlatKeys, KeyStrategy, ProductKeys};
use crate::registry::PluginRegistry;
use parking_lot::Mutex;
use plugix_contract::{define, DefinedPlugin, InterfaceDefinition};
use plugix_registry::{InterfaceType, PluginKey, RegistryEntry, RegistryIndex};
use plugix_schema::ListMode;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolver for `products`
pub type ProductsResolver = InterfaceResolver<ProductKeys>;

/// Steps of one `get_plugin` call
#[derive(Debug)]
enum Phase {
    Lookup,
    /// Missed against `observed`; run the indexer and reload
    Rebuilding { observed: u64, miss: ResolveError },
    RetryLookup,
}

#[derive(Debug)]
pub struct InterfaceResolver<S: KeyStrategy = FlatKeys> {
    registry: PluginRegistry,
    interface: InterfaceDefinition,
    strategy: S,
    rebuild_on_miss: bool,
    /// Sorted keys, tagged with the generation they were read from
    key_cache: Mutex<Option<(u64, Arc<[PluginKey]>)>>,
}

impl InterfaceResolver<FlatKeys> {
    pub fn new(registry: &PluginRegistry, interface: &str) -> Result<Self, ResolveError> {
        Self::with_strategy(registry, interface, FlatKeys)
    }
}

impl<S: KeyStrategy> InterfaceResolver<S> {
    pub fn with_strategy(registry: &PluginRegistry, interface: &str, strategy: S) -> Result<Self, ResolveError> {
        let definition = registry
            .catalog()
            .get(interface)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownInterface(interface.to_string()))?;
        if definition.key_shape != strategy.shape() {
            return Err(ResolveError::ResolverShape {
                interface: interface.to_string(),
                actual: format!("{:?}", definition.key_shape),
                requested: format!("{:?}", strategy.shape()),
            });
        }

        Ok(InterfaceResolver {
            registry: registry.clone(),
            interface: definition,
            strategy,
            rebuild_on_miss: registry.rebuild_on_miss(),
            key_cache: Mutex::new(None),
        })
    }

    /// Override the registry's rebuild-on-miss default for this resolver
    pub fn rebuild_on_miss(mut self, enabled: bool) -> Self {
        self.rebuild_on_miss = enabled;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface.name
    }

    pub fn interface_type(&self) -> InterfaceType {
        self.interface.interface_type
    }

    pub fn get_plugin(&self, key: impl Into<PluginKey>) -> Result<PluginDescriptor, ResolveError> {
        self.get_plugin_with(key, self.rebuild_on_miss)
    }

    /// Look up `key`, rebuilding the index at most once on a miss
    pub fn get_plugin_with(
        &self,
        key: impl Into<PluginKey>,
        rebuild_on_miss: bool,
    ) -> Result<PluginDescriptor, ResolveError> {
        let key = key.into();
        if !self.strategy.accepts(&key) {
            return Err(ResolveError::KeyShape {
                interface: self.interface.name.to_string(),
                key,
            });
        }

        let mut phase = Phase::Lookup;
        loop {
            phase = match phase {
                Phase::Lookup => {
                    let (index, observed) = self.registry.shared().snapshot_with_generation();
                    match self.attempt(&index, &key) {
                        Err(miss) if miss.is_miss() && rebuild_on_miss => {
                            debug!("{}; rebuilding the registry index", miss);
                            Phase::Rebuilding { observed, miss }
                        }
                        outcome => return outcome,
                    }
                }
                Phase::Rebuilding { observed, miss } => match self.registry.rebuild_after(observed) {
                    Ok(ticket) => {
                        debug!(
                            "Retrying '{}' against generation {}",
                            key,
                            ticket.generation()
                        );
                        Phase::RetryLookup
                    }
                    Err(e) => {
                        warn!("Registry rebuild failed: {}", e);
                        return Err(miss);
                    }
                },
                Phase::RetryLookup => {
                    let index = self.registry.snapshot();
                    return self.attempt(&index, &key);
                }
            };
        }
    }

    /// Every plugin of this interface; empty when none are installed
    pub fn get_plugins(&self) -> Result<Vec<PluginDescriptor>, ResolveError> {
        let index = self.registry.snapshot();
        index
            .entries(self.interface.interface_type, &self.interface.name)
            .into_iter()
            .map(|entry| self.materialize(&index, entry, &entry.key))
            .collect()
    }

    /// Whether `key` resolves to a valid plugin; errors are logged, not raised
    pub fn plugin_is_valid(&self, key: impl Into<PluginKey>) -> bool {
        let key = key.into();
        match self.get_plugin(key.clone()) {
            Ok(_) => true,
            Err(e) => {
                debug!("Plugin '{}' of '{}' is not valid: {}", key, self.interface.name, e);
                false
            }
        }
    }

    pub fn plugins_all_valid(&self) -> bool {
        match self.get_plugins() {
            Ok(_) => true,
            Err(e) => {
                debug!("Interface '{}' has invalid plugins: {}", self.interface.name, e);
                false
            }
        }
    }

    /// Sorted plugin keys of the current index generation
    pub fn plugin_keys(&self) -> Arc<[PluginKey]> {
        let (index, generation) = self.registry.shared().snapshot_with_generation();
        let mut cache = self.key_cache.lock();
        if let Some((cached_generation, keys)) = &*cache {
            if *cached_generation == generation {
                return Arc::clone(keys);
            }
        }

        let keys: Arc<[PluginKey]> = index
            .entries(self.interface.interface_type, &self.interface.name)
            .into_iter()
            .map(|entry| entry.key.clone())
            .collect();
        *cache = Some((generation, Arc::clone(&keys)));
        keys
    }

    fn attempt(&self, index: &RegistryIndex, key: &PluginKey) -> Result<PluginDescriptor, ResolveError> {
        let Some(entry) = index.lookup(self.interface.interface_type, &self.interface.name, key) else {
            return Err(self.not_found(key));
        };
        self.materialize(index, entry, key)
    }

    fn not_found(&self, key: &PluginKey) -> ResolveError {
        ResolveError::NotFound {
            interface: self.interface.name.to_string(),
            key: key.clone(),
        }
    }

    fn load_failure(&self, key: &PluginKey, path: &std::path::Path, error: LoadError) -> ResolveError {
        if error.is_missing() {
            ResolveError::FileMissing {
                interface: self.interface.name.to_string(),
                key: key.clone(),
                path: path.to_path_buf(),
            }
        } else {
            error.into()
        }
    }

    /// Load, validate or define the body an index entry points at
    fn materialize(
        &self,
        index: &RegistryIndex,
        entry: &RegistryEntry,
        key: &PluginKey,
    ) -> Result<PluginDescriptor, ResolveError> {
        let (package, relpath) = entry.location();
        let abspath = self.registry.roots().abspath(package, relpath);

        let (family, name, docstring, body) = match self.interface.interface_type {
            InterfaceType::Declarative => {
                let mut document = self
                    .registry
                    .documents()
                    .load(&abspath)
                    .map_err(|e| self.load_failure(key, &abspath, e))?;
                if let Some(object) = document.as_object_mut() {
                    for (field, value) in [("package", package), ("relpath", relpath)] {
                        object
                            .entry(field)
                            .or_insert_with(|| Value::String(value.to_string()));
                    }
                }

                let Some(document) = self.strategy.select(document, key)? else {
                    return Err(self.not_found(key));
                };
                let defaults = IndexDefaultsProvider::new(&self.registry, index);
                let validated = self
                    .registry
                    .engine()
                    .validate(&document, &defaults, ListMode::NoFailFast)?;
                if validated.interface != *self.interface.name {
                    return Err(ResolveError::InterfaceMismatch {
                        interface: self.interface.name.to_string(),
                        key: key.clone(),
                        declared: validated.interface,
                    });
                }
                (
                    validated.family.clone(),
                    validated.name.clone(),
                    validated.docstring.clone(),
                    PluginBody::Spec(validated),
                )
            }
            InterfaceType::Code => {
                let definition = self
                    .registry
                    .code()
                    .load(package, relpath)
                    .map_err(|e| self.load_failure(key, &abspath, e))?;
                let DefinedPlugin::Concrete(plugin) = define(definition, self.registry.catalog())? else {
                    return Err(ResolveError::AbstractPlugin {
                        interface: self.interface.name.to_string(),
                        key: key.clone(),
                    });
                };
                if plugin.interface() != &*self.interface.name {
                    return Err(ResolveError::InterfaceMismatch {
                        interface: self.interface.name.to_string(),
                        key: key.clone(),
                        declared: plugin.interface().to_string(),
                    });
                }
                (
                    plugin.family().to_string(),
                    plugin.name().to_string(),
                    plugin.docstring().to_string(),
                    PluginBody::Callable(Arc::new(plugin)),
                )
            }
        };

        Ok(PluginDescriptor {
            id: format!("{}.{}", self.interface.name, key),
            key: key.clone(),
            interface: self.interface.name.to_string(),
            family,
            name,
            docstring,
            package: package.to_string(),
            relpath: relpath.to_string(),
            abspath,
            body,
        })
    }
}
