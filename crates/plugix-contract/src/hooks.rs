//! Per-interface pre/post processing around plugin calls

use crate::errors::InvokeError;
use crate::payload::CallArgs;
use serde_json::Value;
use std::fmt;

/// Cross-cutting behavior shared by every plugin of one interface
///
/// Both hooks default to identity.
pub trait InterfaceHooks: Send + Sync + fmt::Debug {
    fn pre(&self, payload: Value, _args: &CallArgs) -> Result<Value, InvokeError> {
        Ok(payload)
    }

    fn post(&self, result: Value, _args: &CallArgs) -> Result<Value, InvokeError> {
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHooks;

impl InterfaceHooks for IdentityHooks {}

/// Output formatters always report a list of written files
///
/// A formatter returning a single path gets it wrapped; `null` becomes an
/// empty list.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputListHooks;

impl InterfaceHooks for OutputListHooks {
    fn post(&self, result: Value, _args: &CallArgs) -> Result<Value, InvokeError> {
        Ok(match result {
            Value::Array(_) => result,
            Value::Null => Value::Array(Vec::new()),
            other => Value::Array(vec![other]),
        })
    }
}
