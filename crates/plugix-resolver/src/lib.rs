//! Plugin resolution over the plugix registry
//!
//! [`PluginRegistry`] ties the shared index, the indexer, the loaders and the
//! validation engine together. An [`InterfaceResolver`] built from it looks
//! plugins up by key and returns ready [`PluginDescriptor`]s, running the
//! indexer once when a lookup misses.

pub mod defaults;
pub mod descriptor;
pub mod errors;
pub mod keys;
pub mod loader;
pub mod paths;
pub mod rebuild;
pub mod registry;
pub mod resolver;

pub use defaults::IndexDefaultsProvider;
pub use descriptor::{PluginBody, PluginDescriptor};
pub use errors::{LoadError, RebuildError, ResolveError};
pub use keys::{FlatKeys, KeyStrategy, ProductKeys};
pub use loader::{CodeLoader, DocumentLoader, StaticCodeRegistry};
pub use paths::PackageRoots;
pub use rebuild::{CommandRebuilder, IndexRebuilder};
pub use registry::{PluginRegistry, PluginRegistryBuilder};
pub use resolver::{InterfaceResolver, ProductsResolver};
