//! Values passed through the invocation pipeline

use serde_json::Value;
use std::collections::BTreeMap;

/// First argument of an invocation
///
/// `NoData` marks plugins that produce data rather than transform it; the
/// pipeline then skips both hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    NoData,
    Data(Value),
}

impl Payload {
    pub fn is_data(&self) -> bool {
        matches!(self, Payload::Data(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::NoData => None,
            Payload::Data(value) => Some(value),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Data(value)
    }
}

/// Arguments after the payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }
}
