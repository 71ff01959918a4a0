use plugix_contract::PluginDefinitionError;
use plugix_registry::{PluginKey, RegistryError};
use plugix_schema::{SchemaError, ValidationError};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const RESOLVE_HINT: &str =
    "Verify the plugin is installed and re-run the indexer (`plugix rebuild`)";

/// Failures of a plugin lookup
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Plugin '{key}' not found in interface '{interface}'. {}", RESOLVE_HINT)]
    NotFound { interface: String, key: PluginKey },

    #[error(
        "Plugin '{key}' of interface '{interface}' points at {}, which no longer exists. {}",
        path.display(),
        RESOLVE_HINT
    )]
    FileMissing {
        interface: String,
        key: PluginKey,
        path: PathBuf,
    },

    #[error("Unknown interface '{0}'")]
    UnknownInterface(String),

    #[error("Interface '{interface}' is not keyed like '{key}'")]
    KeyShape { interface: String, key: PluginKey },

    #[error("Interface '{interface}' is keyed {actual}, this resolver expects {requested}")]
    ResolverShape {
        interface: String,
        actual: String,
        requested: String,
    },

    #[error("Plugin '{key}' of interface '{interface}' is abstract and cannot be resolved")]
    AbstractPlugin { interface: String, key: PluginKey },

    #[error("Plugin '{key}' was registered under '{interface}' but declares interface '{declared}'")]
    InterfaceMismatch {
        interface: String,
        key: PluginKey,
        declared: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Definition(#[from] PluginDefinitionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Rebuild(#[from] RebuildError),
}

impl ResolveError {
    /// Misses are the errors a rebuild of the index can repair
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            ResolveError::NotFound { .. } | ResolveError::FileMissing { .. }
        )
    }
}

/// Failures while reading a plugin body
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Plugin file {} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse plugin document {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("No code unit registered for {package}: {relpath}")]
    NoCodeUnit { package: String, relpath: String },
}

impl LoadError {
    /// Whether the body the index points at is gone
    pub fn is_missing(&self) -> bool {
        matches!(self, LoadError::Missing { .. } | LoadError::NoCodeUnit { .. })
    }
}

/// Failures of the external indexer
#[derive(Error, Debug)]
pub enum RebuildError {
    #[error("No indexer configured; set 'indexer' in the plugix configuration")]
    NotConfigured,

    #[error("Failed to start indexer '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Indexer '{command}' failed with exit code {status:?}")]
    Failed { command: String, status: Option<i32> },

    #[error("Indexer '{command}' timed out after {}s", timeout.as_secs_f32())]
    TimedOut { command: String, timeout: Duration },

    #[error("Indexer finished but the index could not be reloaded: {0}")]
    Reload(#[source] RegistryError),
}
