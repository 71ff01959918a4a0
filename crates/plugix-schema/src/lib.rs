//! Declarative plugin validation
//!
//! Schemas are registered per `"<interface>.<family>"` key and resolved into a
//! [`SchemaTable`]; the [`ValidationEngine`] dispatches each document to its
//! schema, merges `defaults` documents and expands `list` documents.

mod check;
pub mod engine;
pub mod errors;
pub mod merge;
pub mod registry;
pub mod types;

pub use engine::{
    DefaultsProvider, DefaultsStore, KeyRule, ListMode, ListReport, NoDefaults, ValidatedDocument,
    ValidationEngine, LIST_FAMILY,
};
pub use errors::{ItemFailure, SchemaError, ValidationError, Violation};
pub use merge::deep_merge;
pub use registry::{SchemaRegistry, SchemaTable};
pub use types::{AdditionalFields, Constraint, FamilySchema, FieldType, SchemaField, SchemaFields};
