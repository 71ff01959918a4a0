use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// One schema violation inside a `spec` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the offending value, e.g. `spec.variables[2]`
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Failure of one sub-document of a `family: list` document
#[derive(Debug)]
pub struct ItemFailure {
    pub item: String,
    pub error: ValidationError,
}

/// Per-plugin validation failures; the resolver reports them, never panics
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(
        "Plugin '{plugin}' (interface '{interface}', family '{family}') failed validation:{}",
        format_violations(.violations)
    )]
    SchemaValidation {
        plugin: String,
        interface: String,
        family: String,
        violations: Vec<Violation>,
    },

    #[error("No validator registered for '{key}'")]
    NoValidator { key: String },

    #[error("Plugin '{plugin}' declares both 'family' and 'defaults'")]
    FamilyConflict { plugin: String },

    #[error("Plugin '{plugin}' is missing required field '{field}'")]
    MissingIdentity { field: String, plugin: String },

    #[error("Defaults document '{name}' for interface '{interface}' not found")]
    DefaultsNotFound { interface: String, name: String },

    #[error("Could not load defaults document '{name}': {reason}")]
    DefaultsUnavailable { name: String, reason: String },

    #[error("Plugin '{plugin}' is not a mapping")]
    NotAMapping { plugin: String },

    #[error(
        "{} item(s) of list '{parent}' ({package}: {relpath}) failed validation:{}",
        .failures.len(),
        format_failures(.failures)
    )]
    ListItems {
        parent: String,
        package: String,
        relpath: String,
        failures: Vec<ItemFailure>,
    },
}

impl ValidationError {
    pub(crate) fn missing(field: &str, plugin: &str) -> Self {
        ValidationError::MissingIdentity {
            field: field.to_string(),
            plugin: plugin.to_string(),
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("\n  - {}", v))
        .collect()
}

fn format_failures(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("\n  [{}] {}", f.item, f.error))
        .collect()
}

/// Defects in the schema table itself; fatal when the table is built
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema '{key}' not found (referenced by '{referenced_by}')")]
    NotFound { key: String, referenced_by: String },

    #[error("Schema '{key}' extends itself through '{via}'")]
    Cycle { key: String, via: String },

    #[error("Invalid pattern '{pattern}' in schema '{key}': {message}")]
    InvalidPattern {
        key: String,
        pattern: String,
        message: String,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse schema file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_schema_validation_lists_each_violation() {
        let err = ValidationError::SchemaValidation {
            plugin: "foo".to_string(),
            interface: "readers".to_string(),
            family: "standard".to_string(),
            violations: vec![
                Violation::new("spec.variables", "missing required field"),
                Violation::new("spec.resolution", "expected float, got str"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Plugin 'foo' (interface 'readers', family 'standard') failed validation:\n  - spec.variables: missing required field\n  - spec.resolution: expected float, got str"
        );
    }

    #[test]
    fn test_list_failure_names_item_and_parent() {
        let err = ValidationError::ListItems {
            parent: "viirs_products".to_string(),
            package: "pkgB".to_string(),
            relpath: "products/viirs.yaml".to_string(),
            failures: vec![ItemFailure {
                item: "Infrared".to_string(),
                error: ValidationError::NoValidator {
                    key: "products.bogus".to_string(),
                },
            }],
        };
        let message = err.to_string();
        assert!(message.starts_with("1 item(s) of list 'viirs_products' (pkgB: products/viirs.yaml)"));
        assert!(message.contains("[Infrared] No validator registered for 'products.bogus'"));
    }
}
