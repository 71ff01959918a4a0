//! Schema description types
//!
//! A [`FamilySchema`] describes the `spec` payload of one `interface.family`
//! pair. Schemas are plain data so they can be shipped as YAML/JSON files next
//! to the plugins or registered from code.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// FIELD TYPE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FieldType {
    #[default]
    Str = 0,
    Int = 1,
    Float = 2,
    Bool = 3,
    Array = 4,
    Object = 5,
    Datetime = 6,
    Any = 7,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Str => "str",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Datetime => "datetime",
            FieldType::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CONSTRAINT
// =============================================================================

/// Validation constraint for a schema field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value")]
pub enum Constraint {
    #[serde(rename = "ge")]
    Ge(f64),
    #[serde(rename = "le")]
    Le(f64),
    #[serde(rename = "gt")]
    Gt(f64),
    #[serde(rename = "lt")]
    Lt(f64),
    #[serde(rename = "min_len")]
    MinLen(u32),
    #[serde(rename = "max_len")]
    MaxLen(u32),
    #[serde(rename = "pattern")]
    Pattern(Arc<str>),
    #[serde(rename = "multiple_of")]
    MultipleOf(f64),
}

// =============================================================================
// FIELDS
// =============================================================================

/// What to do with `spec` keys the schema does not declare
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdditionalFields {
    #[default]
    Forbid,
    Allow,
}

/// Collection of field definitions, ordered by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFields {
    #[serde(flatten)]
    pub fields: BTreeMap<Arc<str>, SchemaField>,
}

impl SchemaFields {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: &str, field: SchemaField) {
        self.fields.insert(Arc::from(name), field);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &SchemaField)> {
        self.fields.iter()
    }
}

/// Single field of a `spec` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    /// Filled in when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub constraints: SmallVec<[Constraint; 2]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Arc<[Value]>>,

    /// For array types - the item schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaField>>,

    /// For object types - nested properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Box<SchemaFields>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Arc<str>>,
}

impl SchemaField {
    pub fn new(field_type: FieldType) -> Self {
        SchemaField {
            field_type,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_enum(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = Some(values.into_iter().collect());
        self
    }

    pub fn with_items(mut self, items: SchemaField) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_properties(mut self, properties: SchemaFields) -> Self {
        self.properties = Some(Box::new(properties));
        self
    }
}

// =============================================================================
// FAMILY SCHEMA
// =============================================================================

/// Schema for the `spec` of one `interface.family`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FamilySchema {
    /// `"<interface>.<family>"`
    pub key: Arc<str>,

    /// Key of a schema whose fields this one starts from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<Arc<str>>,

    #[serde(default)]
    pub fields: SchemaFields,

    #[serde(default)]
    pub additional_fields: AdditionalFields,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Arc<str>>,
}

impl FamilySchema {
    pub fn new(key: &str) -> Self {
        FamilySchema {
            key: Arc::from(key),
            ..Default::default()
        }
    }

    pub fn extends(mut self, base: &str) -> Self {
        self.extends = Some(Arc::from(base));
        self
    }

    pub fn field(mut self, name: &str, field: SchemaField) -> Self {
        self.fields.insert(name, field);
        self
    }

    pub fn allow_additional(mut self) -> Self {
        self.additional_fields = AdditionalFields::Allow;
        self
    }
}

/// Compound validator key
pub fn schema_key(interface: &str, family: &str) -> String {
    format!("{}.{}", interface, family)
}
