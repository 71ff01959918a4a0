//! Checking a `spec` value against schema fields

use crate::errors::Violation;
use crate::types::{AdditionalFields, Constraint, FieldType, SchemaField, SchemaFields};
use ahash::AHashMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;

pub(crate) type Patterns = AHashMap<Arc<str>, Regex>;

/// Walks a value, filling defaults and collecting every violation
pub(crate) struct Checker<'a> {
    patterns: &'a Patterns,
    additional: AdditionalFields,
    violations: Vec<Violation>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(patterns: &'a Patterns, additional: AdditionalFields) -> Self {
        Checker {
            patterns,
            additional,
            violations: Vec::new(),
        }
    }

    pub(crate) fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    fn violation(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    pub(crate) fn check_object(
        &mut self,
        path: &str,
        fields: &SchemaFields,
        object: &mut Map<String, Value>,
    ) {
        for (name, field) in fields.iter() {
            let field_path = format!("{}.{}", path, name);
            match object.get_mut(&**name) {
                Some(value) => self.check_field(&field_path, field, value),
                None => match &field.default {
                    Some(default) => {
                        object.insert(name.to_string(), default.clone());
                    }
                    None if field.required => self.violation(&field_path, "missing required field"),
                    None => {}
                },
            }
        }

        if self.additional == AdditionalFields::Forbid {
            let unknown: Vec<String> = object
                .keys()
                .filter(|key| fields.get(key).is_none())
                .cloned()
                .collect();
            for key in unknown {
                self.violation(&format!("{}.{}", path, key), "unexpected field");
            }
        }
    }

    pub(crate) fn check_field(&mut self, path: &str, field: &SchemaField, value: &mut Value) {
        if value.is_null() {
            if field.required {
                self.violation(path, "must not be null");
            }
            return;
        }

        if !type_matches(field.field_type, value) {
            self.violation(
                path,
                format!(
                    "expected {}, got {}",
                    field.field_type,
                    json_type_name(value)
                ),
            );
            return;
        }

        if let Some(allowed) = &field.enum_values {
            if !allowed.iter().any(|candidate| *candidate == *value) {
                let choices: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                self.violation(
                    path,
                    format!("{} is not one of [{}]", value, choices.join(", ")),
                );
            }
        }

        for constraint in &field.constraints {
            if let Some(message) = self.constraint_failure(constraint, value) {
                self.violation(path, message);
            }
        }

        match value {
            Value::Array(items) => {
                if let Some(item_field) = &field.items {
                    for (i, item) in items.iter_mut().enumerate() {
                        self.check_field(&format!("{}[{}]", path, i), item_field, item);
                    }
                }
            }
            Value::Object(object) => {
                if let Some(properties) = &field.properties {
                    self.check_object(path, properties, object);
                }
            }
            _ => {}
        }
    }

    fn constraint_failure(&self, constraint: &Constraint, value: &Value) -> Option<String> {
        match constraint {
            Constraint::Ge(bound) => number(value)
                .filter(|n| n < bound)
                .map(|n| format!("{} is less than {}", n, bound)),
            Constraint::Le(bound) => number(value)
                .filter(|n| n > bound)
                .map(|n| format!("{} is greater than {}", n, bound)),
            Constraint::Gt(bound) => number(value)
                .filter(|n| n <= bound)
                .map(|n| format!("{} must be greater than {}", n, bound)),
            Constraint::Lt(bound) => number(value)
                .filter(|n| n >= bound)
                .map(|n| format!("{} must be less than {}", n, bound)),
            Constraint::MultipleOf(step) => number(value)
                .filter(|n| *step != 0.0 && (n / step).fract().abs() > f64::EPSILON)
                .map(|n| format!("{} is not a multiple of {}", n, step)),
            Constraint::MinLen(min) => length(value)
                .filter(|len| len < &(*min as usize))
                .map(|len| format!("length {} is shorter than {}", len, min)),
            Constraint::MaxLen(max) => length(value)
                .filter(|len| len > &(*max as usize))
                .map(|len| format!("length {} is longer than {}", len, max)),
            Constraint::Pattern(pattern) => {
                let text = value.as_str()?;
                match self.patterns.get(pattern) {
                    Some(regex) if regex.is_match(text) => None,
                    Some(_) => Some(format!("'{}' does not match pattern '{}'", text, pattern)),
                    None => Some(format!("pattern '{}' was not compiled", pattern)),
                }
            }
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn type_matches(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::Str => value.is_string(),
        FieldType::Int => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::Bool => value.is_boolean(),
        FieldType::Array => value.is_array(),
        FieldType::Object => value.is_object(),
        FieldType::Datetime => value.as_str().is_some_and(is_datetime),
        FieldType::Any => true,
    }
}

fn is_datetime(text: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(text).is_ok()
        || chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok()
        || chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(fields: &SchemaFields, value: Value, patterns: &Patterns) -> (Value, Vec<Violation>) {
        let mut value = value;
        let mut checker = Checker::new(patterns, AdditionalFields::Forbid);
        if let Value::Object(object) = &mut value {
            checker.check_object("spec", fields, object);
        }
        (value, checker.into_violations())
    }

    #[test]
    fn test_defaults_are_filled_and_required_reported() {
        let mut fields = SchemaFields::default();
        fields.insert("variables", SchemaField::new(FieldType::Array).required());
        fields.insert(
            "resolution",
            SchemaField::new(FieldType::Float).with_default(json!(2.0)),
        );

        let (value, violations) = check(&fields, json!({}), &Patterns::default());
        assert_eq!(value, json!({"resolution": 2.0}));
        assert_eq!(
            violations,
            vec![Violation::new("spec.variables", "missing required field")]
        );
    }

    #[test]
    fn test_types_constraints_and_unknown_fields() {
        let mut patterns = Patterns::default();
        if let Ok(regex) = Regex::new("^B[0-9]{2}$") {
            patterns.insert(Arc::from("^B[0-9]{2}$"), regex);
        }

        let mut fields = SchemaFields::default();
        fields.insert(
            "channels",
            SchemaField::new(FieldType::Array).with_items(
                SchemaField::new(FieldType::Str)
                    .with_constraint(Constraint::Pattern(Arc::from("^B[0-9]{2}$"))),
            ),
        );
        fields.insert(
            "gamma",
            SchemaField::new(FieldType::Float)
                .with_constraint(Constraint::Gt(0.0))
                .with_constraint(Constraint::Le(10.0)),
        );
        fields.insert(
            "mode",
            SchemaField::new(FieldType::Str).with_enum([json!("linear"), json!("log")]),
        );
        fields.insert("count", SchemaField::new(FieldType::Int));

        let (_, violations) = check(
            &fields,
            json!({"channels": ["B07", "red"], "gamma": 0, "mode": "cubic", "count": 1.5, "extra": true}),
            &patterns,
        );
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["spec.channels[1]", "spec.count", "spec.gamma", "spec.mode", "spec.extra"]
        );
    }

    #[test]
    fn test_nested_properties_and_datetime() {
        let mut inner = SchemaFields::default();
        inner.insert("start", SchemaField::new(FieldType::Datetime).required());
        let mut fields = SchemaFields::default();
        fields.insert(
            "window",
            SchemaField::new(FieldType::Object).with_properties(inner),
        );

        let (_, ok) = check(
            &fields,
            json!({"window": {"start": "2024-01-01T00:00:00Z"}}),
            &Patterns::default(),
        );
        assert!(ok.is_empty());

        let (_, bad) = check(
            &fields,
            json!({"window": {"start": "yesterday"}}),
            &Patterns::default(),
        );
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].path, "spec.window.start");
    }
}
