use plugix_contract::{CallArgs, Invoke, InvokeError, Payload, WrappedPlugin};
use plugix_registry::PluginKey;
use plugix_schema::ValidatedDocument;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// What a resolved plugin carries
#[derive(Debug, Clone)]
pub enum PluginBody {
    /// Validated declarative document
    Spec(ValidatedDocument),
    /// Wrapped code-defined plugin
    Callable(Arc<WrappedPlugin>),
}

/// A ready-to-use plugin
///
/// Descriptors are snapshots: a later index rebuild does not touch
/// descriptors already handed out.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    /// `<interface>.<key>`
    pub id: String,
    pub key: PluginKey,
    pub interface: String,
    pub family: String,
    pub name: String,
    pub docstring: String,
    pub package: String,
    pub relpath: String,
    pub abspath: PathBuf,
    pub body: PluginBody,
}

impl PluginDescriptor {
    pub fn is_callable(&self) -> bool {
        matches!(self.body, PluginBody::Callable(_))
    }

    /// Validated `spec` of a declarative plugin
    pub fn spec(&self) -> Option<&Value> {
        match &self.body {
            PluginBody::Spec(document) => Some(&document.spec),
            PluginBody::Callable(_) => None,
        }
    }

    pub fn document(&self) -> Option<&ValidatedDocument> {
        match &self.body {
            PluginBody::Spec(document) => Some(document),
            PluginBody::Callable(_) => None,
        }
    }

    pub fn callable(&self) -> Option<&WrappedPlugin> {
        match &self.body {
            PluginBody::Callable(plugin) => Some(plugin),
            PluginBody::Spec(_) => None,
        }
    }

    /// Invoke a code-defined plugin; declarative plugins fail
    pub fn invoke(&self, payload: Payload, args: CallArgs) -> Result<Value, InvokeError> {
        match &self.body {
            PluginBody::Callable(plugin) => plugin.invoke(payload, args),
            PluginBody::Spec(_) => Err(InvokeError::failed(
                &self.name,
                format!("'{}' is a declarative plugin and cannot be invoked", self.id),
            )),
        }
    }
}
