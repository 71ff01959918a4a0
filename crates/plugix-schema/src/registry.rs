//! Registration table mapping `interface.family` to schemas
//!
//! [`SchemaRegistry`] collects raw schemas (from files or code);
//! [`SchemaRegistry::build`] resolves `extends` chains and compiles patterns
//! into an immutable [`SchemaTable`]. Every configuration defect surfaces at
//! build time.

use crate::check::{Checker, Patterns};
use crate::errors::{SchemaError, Violation};
use crate::types::{Constraint, FamilySchema, SchemaField, SchemaFields};
use ahash::AHashMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    Many(Vec<FamilySchema>),
    One(FamilySchema),
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<Arc<str>, FamilySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every `*.yaml`, `*.yml` and `*.json` schema file in `dir`
    ///
    /// A file holds one schema or a list of schemas. A missing directory
    /// yields an empty registry.
    pub fn from_dir(dir: &Path) -> Result<Self, SchemaError> {
        let mut registry = SchemaRegistry::new();
        if !dir.is_dir() {
            debug!("Schema directory {} does not exist", dir.display());
            return Ok(registry);
        }

        let read_dir = fs::read_dir(dir).map_err(|source| SchemaError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files: Vec<_> = read_dir
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml" | "json")
                )
            })
            .collect();
        files.sort();

        for path in files {
            for schema in read_schema_file(&path)? {
                registry.register(schema);
            }
        }
        debug!(
            "Loaded {} schema(s) from {}",
            registry.schemas.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Add a schema; a later registration under the same key replaces the earlier one
    pub fn register(&mut self, schema: FamilySchema) -> &mut Self {
        if self.schemas.contains_key(&schema.key) {
            warn!("Schema '{}' registered twice; keeping the last one", schema.key);
        }
        self.schemas.insert(schema.key.clone(), schema);
        self
    }

    pub fn with(mut self, schema: FamilySchema) -> Self {
        self.register(schema);
        self
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Resolve `extends` chains and compile every pattern
    pub fn build(&self) -> Result<SchemaTable, SchemaError> {
        let mut resolved: AHashMap<Arc<str>, Arc<FamilySchema>> = AHashMap::new();
        for key in self.schemas.keys() {
            let mut chain = Vec::new();
            self.resolve(key, &mut chain, &mut resolved)?;
        }

        let mut patterns = Patterns::default();
        for schema in resolved.values() {
            compile_patterns(&schema.key, &schema.fields, &mut patterns)?;
        }

        Ok(SchemaTable {
            schemas: resolved,
            patterns,
        })
    }

    fn resolve(
        &self,
        key: &Arc<str>,
        chain: &mut Vec<Arc<str>>,
        resolved: &mut AHashMap<Arc<str>, Arc<FamilySchema>>,
    ) -> Result<Arc<FamilySchema>, SchemaError> {
        if let Some(done) = resolved.get(key) {
            return Ok(Arc::clone(done));
        }
        if chain.contains(key) {
            return Err(SchemaError::Cycle {
                key: key.to_string(),
                via: chain.last().map(|k| k.to_string()).unwrap_or_default(),
            });
        }

        let Some(schema) = self.schemas.get(key) else {
            return Err(SchemaError::NotFound {
                key: key.to_string(),
                referenced_by: chain.last().map(|k| k.to_string()).unwrap_or_default(),
            });
        };

        let flattened = match &schema.extends {
            Some(base_key) => {
                chain.push(Arc::clone(key));
                let base = self.resolve(base_key, chain, resolved)?;
                chain.pop();

                let mut fields = base.fields.clone();
                for (name, field) in schema.fields.iter() {
                    fields.fields.insert(Arc::clone(name), field.clone());
                }
                FamilySchema {
                    fields,
                    description: schema
                        .description
                        .clone()
                        .or_else(|| base.description.clone()),
                    ..schema.clone()
                }
            }
            None => schema.clone(),
        };

        let flattened = Arc::new(flattened);
        resolved.insert(Arc::clone(key), Arc::clone(&flattened));
        Ok(flattened)
    }
}

fn read_schema_file(path: &Path) -> Result<Vec<FamilySchema>, SchemaError> {
    let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| SchemaError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let file: SchemaFile = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
    } else {
        serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
    };

    Ok(match file {
        SchemaFile::Many(schemas) => schemas,
        SchemaFile::One(schema) => vec![schema],
    })
}

fn compile_patterns(key: &str, fields: &SchemaFields, patterns: &mut Patterns) -> Result<(), SchemaError> {
    for (_, field) in fields.iter() {
        compile_field_patterns(key, field, patterns)?;
    }
    Ok(())
}

fn compile_field_patterns(
    key: &str,
    field: &SchemaField,
    patterns: &mut Patterns,
) -> Result<(), SchemaError> {
    for constraint in &field.constraints {
        if let Constraint::Pattern(pattern) = constraint {
            if patterns.contains_key(pattern) {
                continue;
            }
            let regex = Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
                key: key.to_string(),
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            patterns.insert(Arc::clone(pattern), regex);
        }
    }
    if let Some(items) = &field.items {
        compile_field_patterns(key, items, patterns)?;
    }
    if let Some(properties) = &field.properties {
        compile_patterns(key, properties, patterns)?;
    }
    Ok(())
}

/// Immutable, fully resolved schema table
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    schemas: AHashMap<Arc<str>, Arc<FamilySchema>>,
    patterns: Patterns,
}

impl SchemaTable {
    pub fn get(&self, key: &str) -> Option<&Arc<FamilySchema>> {
        self.schemas.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.schemas.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.schemas.keys().map(|k| &**k).collect();
        keys.sort_unstable();
        keys
    }

    /// Check `spec` in place (filling defaults); empty when it conforms
    pub(crate) fn check_spec(&self, schema: &FamilySchema, spec: &mut Value) -> Vec<Violation> {
        let Value::Object(object) = spec else {
            return vec![Violation::new(
                "spec",
                format!("expected object, got {}", crate::check::json_type_name(spec)),
            )];
        };
        let mut checker = Checker::new(&self.patterns, schema.additional_fields);
        checker.check_object("spec", &schema.fields, object);
        checker.into_violations()
    }
}
