//! Call signatures of plugin implementations

use crate::errors::InvokeError;
use crate::payload::{CallArgs, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// May be passed by position or by name
    Positional,
    /// Keyword-only
    Named,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Param {
    pub name: Arc<str>,
    pub kind: ParamKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Param {
    pub fn positional(name: &str) -> Self {
        Param {
            name: Arc::from(name),
            kind: ParamKind::Positional,
            default: None,
        }
    }

    pub fn named(name: &str) -> Self {
        Param {
            name: Arc::from(name),
            kind: ParamKind::Named,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Ordered parameter list, captured once when a plugin is defined
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Signature {
    params: SmallVec<[Param; 4]>,
}

impl Signature {
    pub fn new(params: impl IntoIterator<Item = Param>) -> Self {
        Signature {
            params: params.into_iter().collect(),
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn positional(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
    }

    pub fn find(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| &*p.name == name)
    }

    /// Match a call against this signature and fill in defaults
    ///
    /// A `Data` payload occupies the first positional slot.
    pub fn bind(&self, plugin: &str, payload: &Payload, args: &CallArgs) -> Result<CallArgs, InvokeError> {
        let positional: Vec<&Param> = self.positional().collect();
        let given = usize::from(payload.is_data()) + args.positional.len();
        if given > positional.len() {
            return Err(InvokeError::TooManyPositional {
                plugin: plugin.to_string(),
                expected: positional.len(),
                given,
            });
        }

        for name in args.named.keys() {
            match positional.iter().position(|p| &*p.name == name) {
                Some(i) if i < given => {
                    return Err(InvokeError::DuplicateArgument {
                        plugin: plugin.to_string(),
                        name: name.clone(),
                    })
                }
                Some(_) => {}
                None if self.find(name).is_some() => {}
                None => {
                    return Err(InvokeError::UnexpectedArgument {
                        plugin: plugin.to_string(),
                        name: name.clone(),
                    })
                }
            }
        }

        let mut bound = args.clone();
        let unfilled = positional
            .iter()
            .skip(given)
            .copied()
            .chain(self.params.iter().filter(|p| p.kind == ParamKind::Named));
        for param in unfilled {
            if bound.named.contains_key(&*param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    bound.named.insert(param.name.to_string(), default.clone());
                }
                None => {
                    return Err(InvokeError::MissingArgument {
                        plugin: plugin.to_string(),
                        name: param.name.to_string(),
                    })
                }
            }
        }
        Ok(bound)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(self.params.len() + 1);
        let mut keyword_marker = false;
        for param in &self.params {
            if param.kind == ParamKind::Named && !keyword_marker {
                parts.push("*".to_string());
                keyword_marker = true;
            }
            match &param.default {
                Some(default) => parts.push(format!("{}={}", param.name, default)),
                None => parts.push(param.name.to_string()),
            }
        }
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reader_signature() -> Signature {
        Signature::new([
            Param::positional("fnames"),
            Param::positional("metadata_only").with_default(false),
            Param::named("chans").with_default(Value::Null),
        ])
    }

    #[test]
    fn test_display_marks_keyword_only() {
        assert_eq!(
            reader_signature().to_string(),
            "(fnames, metadata_only=false, *, chans=null)"
        );
    }

    #[test]
    fn test_bind_fills_defaults() {
        let args = CallArgs::new().arg(json!(["a.nc"]));
        let bound = reader_signature().bind("foo", &Payload::NoData, &args);
        assert!(bound.is_ok_and(|b| b.get("metadata_only") == Some(&json!(false))
            && b.get("chans") == Some(&Value::Null)));
    }

    #[test]
    fn test_bind_rejects_bad_calls() {
        let sig = reader_signature();
        let missing = sig.bind("foo", &Payload::NoData, &CallArgs::new());
        assert!(matches!(missing, Err(InvokeError::MissingArgument { ref name, .. }) if name == "fnames"));

        let unexpected = sig.bind(
            "foo",
            &Payload::Data(json!(["a.nc"])),
            &CallArgs::new().kwarg("bogus", 1),
        );
        assert!(matches!(unexpected, Err(InvokeError::UnexpectedArgument { .. })));

        let duplicate = sig.bind(
            "foo",
            &Payload::Data(json!(["a.nc"])),
            &CallArgs::new().kwarg("fnames", json!([])),
        );
        assert!(matches!(duplicate, Err(InvokeError::DuplicateArgument { .. })));

        let too_many = sig.bind(
            "foo",
            &Payload::Data(json!(["a.nc"])),
            &CallArgs::new().arg(true).arg(1),
        );
        assert!(matches!(
            too_many,
            Err(InvokeError::TooManyPositional { expected: 2, given: 3, .. })
        ));
    }
}
