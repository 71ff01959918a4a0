//! Contracts for code-defined plugins
//!
//! Interfaces and their families live in an [`InterfaceCatalog`]. A code unit
//! becomes a plugin through [`define`], which checks its identity, the family
//! signature and the reserved entry point before any call is made. The
//! resulting [`WrappedPlugin`] runs every call through the interface hooks.

pub mod errors;
pub mod hooks;
pub mod interface;
pub mod payload;
pub mod signature;
pub mod wrapper;

pub use errors::{InvokeError, PluginDefinitionError};
pub use hooks::{IdentityHooks, InterfaceHooks, OutputListHooks};
pub use interface::{FamilyContract, InterfaceCatalog, InterfaceDefinition, KeyShape, NamedRequirement};
pub use payload::{CallArgs, Payload};
pub use signature::{Param, ParamKind, Signature};
pub use wrapper::{
    define, AbstractBase, Callable, CodeUnit, DefinedPlugin, Invoke, PluginDefinition, WrappedPlugin,
    ENTRY_POINT, IMPLEMENTATION,
};
