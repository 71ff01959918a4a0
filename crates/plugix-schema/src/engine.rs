//! Validator dispatch for declarative plugin documents
//!
//! A document names its validator through `interface` and `family`
//! (`"<interface>.<family>"`). Composable documents name a `defaults` document
//! instead; its family is inherited and the plugin's own `spec` is merged over
//! the defaults' `spec`. Documents of family `list` carry sub-documents under
//! `spec.<interface>` which are validated one by one.

use crate::errors::{ItemFailure, ValidationError, Violation};
use crate::merge::deep_merge;
use crate::registry::SchemaTable;
use crate::types::schema_key;
use ahash::AHashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Family name of documents that hold a list of sub-documents
pub const LIST_FAMILY: &str = "list";

/// Fields every declarative document must carry as non-empty strings
pub const IDENTITY_FIELDS: [&str; 4] = ["package", "relpath", "interface", "name"];

/// Fields a sub-document takes from its list parent when absent
const INHERITED_FIELDS: [&str; 3] = ["interface", "package", "relpath"];

/// How the validator key is derived for one interface
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyRule {
    /// `"<interface>.<family>"`
    #[default]
    Family,
    /// `"<interface>.<value of field>"`, looked up at top level, then in `spec`
    SubKind(Arc<str>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListMode {
    /// Validate every sub-document and report all failures
    #[default]
    NoFailFast,
    /// Stop at the first failing sub-document
    FailFast,
}

/// Source of named defaults documents
pub trait DefaultsProvider {
    /// Look up defaults document `name` for a plugin of `interface`
    fn resolve_defaults(&self, interface: &str, name: &str) -> Result<Value, ValidationError>;
}

/// In-memory defaults, keyed by consuming interface and name
#[derive(Debug, Clone, Default)]
pub struct DefaultsStore {
    documents: AHashMap<(String, String), Value>,
}

impl DefaultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, interface: &str, name: &str, document: Value) {
        self.documents
            .insert((interface.to_string(), name.to_string()), document);
    }
}

impl DefaultsProvider for DefaultsStore {
    fn resolve_defaults(&self, interface: &str, name: &str) -> Result<Value, ValidationError> {
        self.documents
            .get(&(interface.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ValidationError::DefaultsNotFound {
                interface: interface.to_string(),
                name: name.to_string(),
            })
    }
}

/// Provider for callers that have no defaults documents at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefaults;

impl DefaultsProvider for NoDefaults {
    fn resolve_defaults(&self, interface: &str, name: &str) -> Result<Value, ValidationError> {
        Err(ValidationError::DefaultsNotFound {
            interface: interface.to_string(),
            name: name.to_string(),
        })
    }
}

/// A document that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument {
    pub interface: String,
    pub family: String,
    pub name: String,
    pub docstring: String,
    pub package: String,
    pub relpath: String,
    /// Validated `spec`, with defaults merged and field defaults filled
    pub spec: Value,
    /// The whole document with `family` resolved and `spec` replaced
    pub document: Value,
    /// Validated sub-documents of a `list` document
    pub items: Vec<ValidatedDocument>,
}

impl ValidatedDocument {
    /// Top-level field of the normalized document
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.document.get(name)
    }
}

/// Per-item outcome of a list document
#[derive(Debug)]
pub struct ListReport {
    pub parent: String,
    pub package: String,
    pub relpath: String,
    pub validated: Vec<ValidatedDocument>,
    pub failures: Vec<ItemFailure>,
}

impl ListReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_result(self) -> Result<Vec<ValidatedDocument>, ValidationError> {
        if self.failures.is_empty() {
            Ok(self.validated)
        } else {
            Err(ValidationError::ListItems {
                parent: self.parent,
                package: self.package,
                relpath: self.relpath,
                failures: self.failures,
            })
        }
    }
}

/// Identity fields read off a document before validation
struct Identity {
    interface: String,
    name: String,
    docstring: String,
    package: String,
    relpath: String,
}

pub struct ValidationEngine {
    table: SchemaTable,
    key_rules: AHashMap<Arc<str>, KeyRule>,
}

impl ValidationEngine {
    pub fn new(table: SchemaTable) -> Self {
        ValidationEngine {
            table,
            key_rules: AHashMap::new(),
        }
    }

    /// Key one interface's validators by something other than `family`
    pub fn with_key_rule(mut self, interface: &str, rule: KeyRule) -> Self {
        self.key_rules.insert(Arc::from(interface), rule);
        self
    }

    pub fn table(&self) -> &SchemaTable {
        &self.table
    }

    /// Validate one document, expanding `list` documents
    pub fn validate(
        &self,
        document: &Value,
        defaults: &dyn DefaultsProvider,
        mode: ListMode,
    ) -> Result<ValidatedDocument, ValidationError> {
        let object = as_object(document)?;
        let identity = read_identity(object)?;
        let (family, spec) = self.resolve_family(object, &identity, defaults)?;

        if family == LIST_FAMILY {
            let report = self.expand_list(object, &identity, spec.clone(), defaults, mode)?;
            let items = report.into_result()?;
            let mut validated = finish(object, identity, family, spec);
            validated.items = items;
            return Ok(validated);
        }

        let key = self.validator_key(object, &identity, &family)?;
        let spec = self.check(&key, &identity, &family, spec)?;
        debug!("Validated '{}' against '{}'", identity.name, key);
        Ok(finish(object, identity, family, spec))
    }

    /// Validate every sub-document of a `list` document and report each outcome
    ///
    /// Only defects of the parent document itself are returned as errors.
    pub fn validate_list(
        &self,
        document: &Value,
        defaults: &dyn DefaultsProvider,
        mode: ListMode,
    ) -> Result<ListReport, ValidationError> {
        let object = as_object(document)?;
        let identity = read_identity(object)?;
        let (family, spec) = self.resolve_family(object, &identity, defaults)?;
        if family != LIST_FAMILY {
            return Err(ValidationError::SchemaValidation {
                plugin: identity.name,
                interface: identity.interface,
                family,
                violations: vec![Violation::new("family", "expected 'list'")],
            });
        }
        self.expand_list(object, &identity, spec, defaults, mode)
    }

    /// Sub-documents of a `list` document with parent fields inherited
    pub fn list_items(document: &Value) -> Result<Vec<Value>, ValidationError> {
        let object = as_object(document)?;
        let identity = read_identity(object)?;
        let spec = object.get("spec").cloned().unwrap_or(Value::Null);
        sub_documents(object, &identity, &spec)
    }

    /// Compound key used to look up the validator of a document
    fn validator_key(
        &self,
        object: &Map<String, Value>,
        identity: &Identity,
        family: &str,
    ) -> Result<String, ValidationError> {
        match self.key_rules.get(identity.interface.as_str()) {
            Some(KeyRule::SubKind(field)) => {
                let kind = object
                    .get(&**field)
                    .or_else(|| object.get("spec").and_then(|spec| spec.get(&**field)))
                    .and_then(Value::as_str)
                    .filter(|kind| !kind.is_empty())
                    .ok_or_else(|| ValidationError::missing(field, &identity.name))?;
                Ok(schema_key(&identity.interface, kind))
            }
            Some(KeyRule::Family) | None => Ok(schema_key(&identity.interface, family)),
        }
    }

    fn check(
        &self,
        key: &str,
        identity: &Identity,
        family: &str,
        mut spec: Value,
    ) -> Result<Value, ValidationError> {
        let schema = self
            .table
            .get(key)
            .ok_or_else(|| ValidationError::NoValidator {
                key: key.to_string(),
            })?;

        let violations = self.table.check_spec(schema, &mut spec);
        if violations.is_empty() {
            Ok(spec)
        } else {
            Err(ValidationError::SchemaValidation {
                plugin: identity.name.clone(),
                interface: identity.interface.clone(),
                family: family.to_string(),
                violations,
            })
        }
    }

    /// Family of the document and its effective `spec`
    fn resolve_family(
        &self,
        object: &Map<String, Value>,
        identity: &Identity,
        defaults: &dyn DefaultsProvider,
    ) -> Result<(String, Value), ValidationError> {
        let own_spec = object
            .get("spec")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        match (object.get("family"), object.get("defaults")) {
            (Some(_), Some(_)) => Err(ValidationError::FamilyConflict {
                plugin: identity.name.clone(),
            }),
            (Some(family), None) => {
                let family = non_empty(family).ok_or_else(|| ValidationError::missing("family", &identity.name))?;
                Ok((family.to_string(), own_spec))
            }
            (None, Some(reference)) => {
                let reference =
                    non_empty(reference).ok_or_else(|| ValidationError::missing("defaults", &identity.name))?;
                let defaults_doc = defaults.resolve_defaults(&identity.interface, reference)?;
                let family = defaults_doc
                    .get("family")
                    .and_then(non_empty)
                    .ok_or_else(|| ValidationError::missing("family", reference))?;
                let base_spec = defaults_doc
                    .get("spec")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                debug!(
                    "Merging '{}' over defaults '{}' (family '{}')",
                    identity.name, reference, family
                );
                Ok((family.to_string(), deep_merge(&base_spec, &own_spec)))
            }
            (None, None) => Err(ValidationError::missing("family", &identity.name)),
        }
    }

    fn expand_list(
        &self,
        object: &Map<String, Value>,
        identity: &Identity,
        spec: Value,
        defaults: &dyn DefaultsProvider,
        mode: ListMode,
    ) -> Result<ListReport, ValidationError> {
        let items = sub_documents(object, identity, &spec)?;

        let mut report = ListReport {
            parent: identity.name.clone(),
            package: identity.package.clone(),
            relpath: identity.relpath.clone(),
            validated: Vec::with_capacity(items.len()),
            failures: Vec::new(),
        };

        for (i, item) in items.iter().enumerate() {
            match self.validate(item, defaults, mode) {
                Ok(validated) => report.validated.push(validated),
                Err(error) => {
                    let item_name = item
                        .get("name")
                        .and_then(non_empty)
                        .map_or_else(|| format!("#{}", i), str::to_string);
                    debug!(
                        "List '{}' item '{}' failed validation: {}",
                        identity.name, item_name, error
                    );
                    report.failures.push(ItemFailure {
                        item: item_name,
                        error,
                    });
                    if mode == ListMode::FailFast {
                        break;
                    }
                }
            }
        }
        Ok(report)
    }
}

fn as_object(document: &Value) -> Result<&Map<String, Value>, ValidationError> {
    document
        .as_object()
        .ok_or_else(|| ValidationError::NotAMapping {
            plugin: document.to_string().chars().take(40).collect(),
        })
}

fn non_empty(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

fn read_identity(object: &Map<String, Value>) -> Result<Identity, ValidationError> {
    let label = object
        .get("name")
        .and_then(non_empty)
        .or_else(|| object.get("relpath").and_then(non_empty))
        .unwrap_or("<unnamed>")
        .to_string();

    let field = |name: &str| -> Result<String, ValidationError> {
        object
            .get(name)
            .and_then(non_empty)
            .map(str::to_string)
            .ok_or_else(|| ValidationError::missing(name, &label))
    };

    let [package, relpath, interface, name] = IDENTITY_FIELDS;
    let identity = Identity {
        package: field(package)?,
        relpath: field(relpath)?,
        interface: field(interface)?,
        name: field(name)?,
        docstring: field("docstring")
            .or_else(|_| field("description"))
            .map_err(|_| ValidationError::missing("docstring", &label))?,
    };
    Ok(identity)
}

fn sub_documents(
    object: &Map<String, Value>,
    identity: &Identity,
    spec: &Value,
) -> Result<Vec<Value>, ValidationError> {
    let Some(Value::Array(items)) = spec.get(&identity.interface) else {
        return Err(ValidationError::SchemaValidation {
            plugin: identity.name.clone(),
            interface: identity.interface.clone(),
            family: LIST_FAMILY.to_string(),
            violations: vec![Violation::new(
                format!("spec.{}", identity.interface),
                "expected a list of sub-documents",
            )],
        });
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let Value::Object(item) = item else {
                return Err(ValidationError::NotAMapping {
                    plugin: format!("{}[{}]", identity.name, i),
                });
            };
            let mut item = item.clone();
            for field in INHERITED_FIELDS {
                if !item.contains_key(field) {
                    if let Some(value) = object.get(field) {
                        item.insert(field.to_string(), value.clone());
                    }
                }
            }
            Ok(Value::Object(item))
        })
        .collect()
}

fn finish(
    object: &Map<String, Value>,
    identity: Identity,
    family: String,
    spec: Value,
) -> ValidatedDocument {
    let mut document = object.clone();
    document.remove("defaults");
    document.insert("family".to_string(), Value::String(family.clone()));
    document.insert("spec".to_string(), spec.clone());

    ValidatedDocument {
        interface: identity.interface,
        family,
        name: identity.name,
        docstring: identity.docstring,
        package: identity.package,
        relpath: identity.relpath,
        spec,
        document: Value::Object(document),
        items: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use crate::types::{FamilySchema, FieldType, SchemaField};
    use serde_json::json;

    fn engine() -> ValidationEngine {
        let registry = SchemaRegistry::new()
            .with(
                FamilySchema::new("readers.standard")
                    .field("variables", SchemaField::new(FieldType::Array).required()),
            )
            .with(
                FamilySchema::new("products.algorithm_colormapper")
                    .field("a", SchemaField::new(FieldType::Int))
                    .field("b", SchemaField::new(FieldType::Int).required()),
            )
            .with(
                FamilySchema::new("sectors.area_definition")
                    .field("projection", SchemaField::new(FieldType::Str).required())
                    .allow_additional(),
            );
        let Ok(table) = registry.build() else {
            panic!("test schemas should build");
        };
        ValidationEngine::new(table).with_key_rule("sectors", KeyRule::SubKind(Arc::from("sector_type")))
    }

    fn reader(name: &str) -> Value {
        json!({
            "interface": "readers",
            "family": "standard",
            "name": name,
            "docstring": "Reads things.",
            "package": "pkgA",
            "relpath": format!("readers/{}.yaml", name),
            "spec": {"variables": ["B14"]}
        })
    }

    fn product(name: &str, spec: Value) -> Value {
        json!({"name": name, "docstring": "A product.", "source_names": ["viirs"], "defaults": "Infrared-Default", "spec": spec})
    }

    fn defaults() -> DefaultsStore {
        let mut store = DefaultsStore::new();
        store.insert(
            "products",
            "Infrared-Default",
            json!({"family": "algorithm_colormapper", "spec": {"a": 1, "b": 2}}),
        );
        store
    }

    #[test]
    fn test_identity_round_trip() {
        let validated = engine().validate(&reader("foo"), &NoDefaults, ListMode::default());
        let Ok(validated) = validated else {
            panic!("reader should validate");
        };
        assert_eq!(
            (validated.interface.as_str(), validated.family.as_str(), validated.name.as_str()),
            ("readers", "standard", "foo")
        );
        assert_eq!(validated.package, "pkgA");
        assert_eq!(validated.field("docstring"), Some(&json!("Reads things.")));
    }

    #[test]
    fn test_description_stands_in_for_docstring() {
        let mut doc = reader("foo");
        if let Some(object) = doc.as_object_mut() {
            object.remove("docstring");
            object.insert("description".to_string(), json!("Described."));
        }
        assert!(engine()
            .validate(&doc, &NoDefaults, ListMode::default())
            .is_ok_and(|v| v.docstring == "Described."));

        if let Some(object) = doc.as_object_mut() {
            object.remove("description");
        }
        let result = engine().validate(&doc, &NoDefaults, ListMode::default());
        assert!(matches!(result, Err(ValidationError::MissingIdentity { ref field, .. }) if field == "docstring"));
    }

    #[test]
    fn test_unknown_family_names_missing_key() {
        let mut doc = reader("foo");
        doc["family"] = json!("exotic");
        let result = engine().validate(&doc, &NoDefaults, ListMode::default());
        assert!(matches!(result, Err(ValidationError::NoValidator { ref key }) if key == "readers.exotic"));
    }

    #[test]
    fn test_schema_violation_reports_plugin() {
        let mut doc = reader("foo");
        doc["spec"] = json!({"variables": "B14"});
        let result = engine().validate(&doc, &NoDefaults, ListMode::default());
        assert!(matches!(
            result,
            Err(ValidationError::SchemaValidation { ref plugin, ref violations, .. })
                if plugin == "foo" && violations.len() == 1
        ));
    }

    #[test]
    fn test_defaults_merge_is_right_biased() {
        let mut doc = product("Infrared", json!({"b": 3}));
        doc["interface"] = json!("products");
        doc["package"] = json!("pkgB");
        doc["relpath"] = json!("products/viirs.yaml");

        let result = engine().validate(&doc, &defaults(), ListMode::default());
        assert!(result.is_ok_and(|v| v.family == "algorithm_colormapper"
            && v.spec == json!({"a": 1, "b": 3})
            && v.field("defaults").is_none()));
    }

    #[test]
    fn test_family_and_defaults_conflict() {
        let mut doc = reader("foo");
        doc["defaults"] = json!("Infrared-Default");
        let result = engine().validate(&doc, &defaults(), ListMode::default());
        assert!(matches!(result, Err(ValidationError::FamilyConflict { .. })));

        let mut doc = reader("foo");
        if let Some(object) = doc.as_object_mut() {
            object.remove("family");
        }
        let result = engine().validate(&doc, &defaults(), ListMode::default());
        assert!(matches!(result, Err(ValidationError::MissingIdentity { ref field, .. }) if field == "family"));
    }

    #[test]
    fn test_list_with_one_defective_item() {
        let doc = json!({
            "interface": "products",
            "family": "list",
            "name": "viirs_products",
            "docstring": "VIIRS products.",
            "package": "pkgB",
            "relpath": "products/viirs.yaml",
            "spec": {"products": [
                product("Infrared", json!({"b": 3})),
                product("Broken", json!({"b": "three"})),
                product("Visible", json!({})),
            ]}
        });

        let Ok(report) = engine().validate_list(&doc, &defaults(), ListMode::NoFailFast) else {
            panic!("parent document is valid");
        };
        assert_eq!(report.validated.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item, "Broken");
        assert!(report.validated.iter().all(|v| v.package == "pkgB" && v.interface == "products"));

        let result = engine().validate(&doc, &defaults(), ListMode::NoFailFast);
        assert!(result.is_err_and(|e| {
            let message = e.to_string();
            message.contains("viirs_products") && message.contains("[Broken]")
        }));

        let mut fail_fast_doc = doc.clone();
        fail_fast_doc["spec"]["products"][0]["spec"] = json!({"b": "x"});
        let report = engine().validate_list(&fail_fast_doc, &defaults(), ListMode::FailFast);
        assert!(report.is_ok_and(|r| r.failures.len() == 1 && r.validated.is_empty()));
    }

    #[test]
    fn test_sub_kind_key_rule() {
        let doc = json!({
            "interface": "sectors",
            "family": "generated",
            "name": "conus",
            "docstring": "CONUS sector.",
            "package": "pkgB",
            "relpath": "sectors/conus.yaml",
            "sector_type": "area_definition",
            "spec": {"projection": "eqc", "resolution": 2000}
        });
        assert!(engine().validate(&doc, &NoDefaults, ListMode::default()).is_ok());

        let mut untyped = doc.clone();
        if let Some(object) = untyped.as_object_mut() {
            object.remove("sector_type");
        }
        let result = engine().validate(&untyped, &NoDefaults, ListMode::default());
        assert!(matches!(result, Err(ValidationError::MissingIdentity { ref field, .. }) if field == "sector_type"));
    }
}
