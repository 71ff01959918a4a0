//! Shared handle over the index, loaders and validators
//!
//! A [`PluginRegistry`] is cheap to clone and is passed explicitly to every
//! resolver. All resolvers built from one handle share the same index
//! snapshot and the same single-flight rebuild.

use crate::errors::{RebuildError, ResolveError};
use crate::keys::{FlatKeys, ProductKeys};
use crate::loader::{CodeLoader, DocumentLoader, StaticCodeRegistry};
use crate::paths::PackageRoots;
use crate::rebuild::{CommandRebuilder, IndexRebuilder};
use crate::resolver::{InterfaceResolver, ProductsResolver};
use plugix_config::Config;
use plugix_contract::InterfaceCatalog;
use plugix_registry::{IndexLayout, RebuildTicket, RegistryError, RegistryIndex, SharedIndex};
use plugix_schema::{KeyRule, SchemaRegistry, SchemaTable, ValidationEngine};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Inner {
    shared: SharedIndex,
    layout: IndexLayout,
    rebuilder: Option<Arc<dyn IndexRebuilder>>,
    roots: PackageRoots,
    engine: ValidationEngine,
    catalog: InterfaceCatalog,
    documents: DocumentLoader,
    code: Arc<dyn CodeLoader>,
    rebuild_on_miss: bool,
}

#[derive(Clone)]
pub struct PluginRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("index_dir", &self.inner.layout.dir())
            .field("generation", &self.inner.shared.generation())
            .field("rebuild_on_miss", &self.inner.rebuild_on_miss)
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    pub fn builder(layout: IndexLayout) -> PluginRegistryBuilder {
        PluginRegistryBuilder::new(layout)
    }

    /// Registry wired from the user configuration
    ///
    /// A missing indexer is not fatal; lookups then fail without a rebuild.
    pub fn from_config(config: &Config, code: impl CodeLoader + 'static) -> Result<Self, ResolveError> {
        let schemas = SchemaRegistry::from_dir(&config.get_schema_dir())?.build()?;
        let engine = config
            .validator_keys()
            .fold(ValidationEngine::new(schemas), |engine, (interface, field)| {
                debug!("Validators of '{}' keyed by '{}'", interface, field);
                engine.with_key_rule(interface, KeyRule::SubKind(Arc::from(field)))
            });
        let mut builder = PluginRegistry::builder(IndexLayout::new(config.get_index_dir()))
            .package_roots(PackageRoots::from_config(config))
            .engine(engine)
            .code_loader(code)
            .rebuild_on_miss(config.rebuild_on_miss());

        match CommandRebuilder::from_config(config) {
            Ok(rebuilder) => builder = builder.rebuilder(rebuilder),
            Err(e) => warn!("Index rebuilds disabled: {}", e),
        }
        builder.build()
    }

    pub fn shared(&self) -> &SharedIndex {
        &self.inner.shared
    }

    pub fn snapshot(&self) -> Arc<RegistryIndex> {
        self.inner.shared.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.inner.shared.generation()
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.inner.layout
    }

    pub fn catalog(&self) -> &InterfaceCatalog {
        &self.inner.catalog
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.inner.engine
    }

    pub fn roots(&self) -> &PackageRoots {
        &self.inner.roots
    }

    pub fn documents(&self) -> &DocumentLoader {
        &self.inner.documents
    }

    pub fn code(&self) -> &dyn CodeLoader {
        &*self.inner.code
    }

    pub fn rebuild_on_miss(&self) -> bool {
        self.inner.rebuild_on_miss
    }

    pub fn has_rebuilder(&self) -> bool {
        self.inner.rebuilder.is_some()
    }

    /// Resolver for a name-keyed interface
    pub fn resolver(&self, interface: &str) -> Result<InterfaceResolver<FlatKeys>, ResolveError> {
        InterfaceResolver::new(self, interface)
    }

    /// Resolver for `products`, keyed by `(source, name)`
    pub fn products(&self) -> Result<ProductsResolver, ResolveError> {
        InterfaceResolver::with_strategy(self, "products", ProductKeys)
    }

    /// Re-read the index documents without running the indexer
    pub fn reload(&self) -> Result<u64, RegistryError> {
        let index = self.inner.layout.load()?;
        Ok(self.inner.shared.replace(index))
    }

    /// Run the indexer and reload, whatever generation is current
    pub fn rebuild(&self) -> Result<RebuildTicket, RebuildError> {
        self.rebuild_after(self.generation())
    }

    /// Run the indexer and reload unless the index moved past `observed`
    ///
    /// Concurrent callers that observed the same generation share one run.
    pub fn rebuild_after(&self, observed: u64) -> Result<RebuildTicket, RebuildError> {
        self.inner.shared.rebuild_once(observed, || {
            let rebuilder = self
                .inner
                .rebuilder
                .as_ref()
                .ok_or(RebuildError::NotConfigured)?;
            rebuilder.rebuild()?;
            self.inner.layout.load().map_err(RebuildError::Reload)
        })
    }
}

pub struct PluginRegistryBuilder {
    layout: IndexLayout,
    rebuilder: Option<Arc<dyn IndexRebuilder>>,
    roots: Option<PackageRoots>,
    schemas: SchemaTable,
    engine: Option<ValidationEngine>,
    catalog: InterfaceCatalog,
    code: Arc<dyn CodeLoader>,
    rebuild_on_miss: bool,
}

impl PluginRegistryBuilder {
    fn new(layout: IndexLayout) -> Self {
        PluginRegistryBuilder {
            layout,
            rebuilder: None,
            roots: None,
            schemas: SchemaTable::default(),
            engine: None,
            catalog: InterfaceCatalog::standard(),
            code: Arc::new(StaticCodeRegistry::new()),
            rebuild_on_miss: true,
        }
    }

    pub fn rebuilder(mut self, rebuilder: impl IndexRebuilder + 'static) -> Self {
        self.rebuilder = Some(Arc::new(rebuilder));
        self
    }

    pub fn shared_rebuilder(mut self, rebuilder: Arc<dyn IndexRebuilder>) -> Self {
        self.rebuilder = Some(rebuilder);
        self
    }

    pub fn package_roots(mut self, roots: PackageRoots) -> Self {
        self.roots = Some(roots);
        self
    }

    pub fn schemas(mut self, schemas: SchemaTable) -> Self {
        self.schemas = schemas;
        self
    }

    /// Use a prepared engine, e.g. one with custom key rules
    pub fn engine(mut self, engine: ValidationEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn catalog(mut self, catalog: InterfaceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn code_loader(mut self, code: impl CodeLoader + 'static) -> Self {
        self.code = Arc::new(code);
        self
    }

    pub fn rebuild_on_miss(mut self, enabled: bool) -> Self {
        self.rebuild_on_miss = enabled;
        self
    }

    /// Load the initial index
    ///
    /// Missing documents leave the index empty so the first lookup goes
    /// through the rebuild protocol. Corrupt documents are fatal.
    pub fn build(self) -> Result<PluginRegistry, ResolveError> {
        let index = match self.layout.load() {
            Ok(index) => {
                info!(
                    "Loaded registry index with {} plugins from {}",
                    index.len(),
                    self.layout.dir().display()
                );
                index
            }
            Err(e) if e.needs_rebuild() => {
                debug!("Starting with an empty index: {}", e);
                RegistryIndex::default()
            }
            Err(e) => return Err(e.into()),
        };

        let roots = self
            .roots
            .unwrap_or_else(|| PackageRoots::new(self.layout.dir()));
        let engine = self
            .engine
            .unwrap_or_else(|| ValidationEngine::new(self.schemas));

        Ok(PluginRegistry {
            inner: Arc::new(Inner {
                shared: SharedIndex::new(index),
                layout: self.layout,
                rebuilder: self.rebuilder,
                roots,
                engine,
                catalog: self.catalog,
                documents: DocumentLoader,
                code: self.code,
                rebuild_on_miss: self.rebuild_on_miss,
            }),
        })
    }
}
