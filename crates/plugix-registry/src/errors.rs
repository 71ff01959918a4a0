use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or writing registry documents
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed document; never repaired automatically
    #[error("Registry index {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// Documents are missing and the indexer has to regenerate them
    #[error("Registry index needs rebuild: {reason}")]
    NeedsRebuild { reason: String },

    #[error("Failed to serialize registry document: {0}")]
    Serialize(String),
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RegistryError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RegistryError::Corrupt {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error should send the caller through the rebuild protocol
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, RegistryError::NeedsRebuild { .. })
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::corrupt("/tmp/registered_plugins.json", "expected map");
        assert_eq!(
            err.to_string(),
            "Registry index /tmp/registered_plugins.json is corrupt: expected map"
        );
        assert!(!err.needs_rebuild());
    }
}
