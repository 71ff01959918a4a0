//! Error types of the plugix command-line front end

use plugix_config::ConfigError;
use plugix_registry::RegistryError;
use plugix_resolver::{RebuildError, ResolveError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Rebuild(#[from] RebuildError),

    #[error("Interface '{0}' is keyed by (source, name); pass --source")]
    SourceRequired(String),

    #[error("{failed} of {checked} plugin(s) failed validation")]
    ValidationFailed { failed: usize, checked: usize },

    #[error("No extended help for '{0}'. Run `plugix describe` for the list of commands")]
    UnknownCommand(String),

    #[error("Failed to write help cache {path}: {source}")]
    HelpCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render output: {0}")]
    Render(String),
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_cli_error_display() {
        let err = CliError::ValidationFailed {
            failed: 1,
            checked: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 plugin(s) failed validation");
        assert_eq!(
            CliError::SourceRequired("products".to_string()).to_string(),
            "Interface 'products' is keyed by (source, name); pass --source"
        );
    }
}
