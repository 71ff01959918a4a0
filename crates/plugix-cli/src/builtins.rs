//! Code plugins compiled into the `plugix` binary
//!
//! The indexer lists them under package [`BUILTIN_PACKAGE`] like any other
//! code plugin; resolution finds them through the static registry.

use plugix_contract::{CallArgs, Callable, CodeUnit, InvokeError, Param, Payload, PluginDefinition, Signature};
use plugix_resolver::StaticCodeRegistry;
use serde_json::{json, Value};
use std::fs;

pub const BUILTIN_PACKAGE: &str = "plugix";
pub const TEXT_LINES_RELPATH: &str = "builtins/readers/text_lines";
pub const SCALE_RELPATH: &str = "builtins/algorithms/scale";

/// Registry holding every builtin code plugin
pub fn code_registry() -> StaticCodeRegistry {
    StaticCodeRegistry::new()
        .with(BUILTIN_PACKAGE, TEXT_LINES_RELPATH, text_lines())
        .with(BUILTIN_PACKAGE, SCALE_RELPATH, scale())
}

/// Reader returning the lines of plain-text files
fn text_lines() -> PluginDefinition {
    PluginDefinition::new(
        CodeUnit::new()
            .interface("readers")
            .family("standard")
            .name("text_lines")
            .docstring("Read plain-text files into a list of lines per file.")
            .call(Callable::new(
                Signature::new([
                    Param::positional("fnames"),
                    Param::named("metadata_only").with_default(false),
                    Param::named("chans").with_default(Value::Null),
                    Param::named("area_def").with_default(Value::Null),
                ]),
                read_text_lines,
            )),
    )
}

fn read_text_lines(_payload: Payload, args: &CallArgs) -> Result<Value, InvokeError> {
    let fnames = args
        .positional
        .first()
        .or_else(|| args.get("fnames"))
        .and_then(Value::as_array)
        .ok_or_else(|| InvokeError::failed("text_lines", "fnames must be a list of paths"))?;
    let metadata_only = args.get("metadata_only").and_then(Value::as_bool) == Some(true);

    let mut files = serde_json::Map::new();
    for fname in fnames.iter().filter_map(Value::as_str) {
        let content = fs::read_to_string(fname)
            .map_err(|e| InvokeError::failed("text_lines", format!("{}: {}", fname, e)))?;
        let lines: Vec<&str> = content.lines().collect();
        let entry = if metadata_only {
            json!({"line_count": lines.len()})
        } else {
            json!({"line_count": lines.len(), "lines": lines})
        };
        files.insert(fname.to_string(), entry);
    }
    Ok(Value::Object(files))
}

/// Algorithm multiplying every number in its input by `factor`
fn scale() -> PluginDefinition {
    PluginDefinition::new(
        CodeUnit::new()
            .interface("algorithms")
            .family("xarray_to_xarray")
            .name("scale")
            .docstring("Multiply every number in the input by a constant factor.")
            .call(Callable::new(
                Signature::new([
                    Param::positional("xobj"),
                    Param::named("factor").with_default(1.0),
                ]),
                |payload, args| {
                    let factor = args.get("factor").and_then(Value::as_f64).unwrap_or(1.0);
                    let input = payload
                        .as_value()
                        .cloned()
                        .ok_or_else(|| InvokeError::failed("scale", "no input data"))?;
                    Ok(scale_value(input, factor))
                },
            )),
    )
}

fn scale_value(value: Value, factor: f64) -> Value {
    match value {
        Value::Number(n) => n.as_f64().map_or(Value::Number(n), |x| json!(x * factor)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| scale_value(v, factor)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, scale_value(v, factor)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugix_contract::{define, Invoke, InterfaceCatalog};
    use plugix_resolver::CodeLoader;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtins_satisfy_their_contracts() {
        let catalog = InterfaceCatalog::standard();
        let registry = code_registry();
        assert_eq!(registry.len(), 2);
        for (package, relpath) in registry.locations() {
            let definition = registry.load(package, relpath);
            let defined = definition.map(|d| define(d, &catalog));
            assert!(matches!(defined, Ok(Ok(_))), "{} failed its contract", relpath);
        }
    }

    #[test]
    fn test_text_lines_reads_files() {
        let Ok(mut file) = NamedTempFile::new() else {
            return;
        };
        let _ = writeln!(file, "first\nsecond");
        let fname = file.path().display().to_string();

        let catalog = InterfaceCatalog::standard();
        let Ok(Some(reader)) = define(text_lines(), &catalog).map(|d| d.into_concrete()) else {
            panic!("text_lines should define");
        };
        let result = reader.invoke(
            Payload::NoData,
            CallArgs::new().arg(json!([fname.clone()])).kwarg("metadata_only", true),
        );
        assert_eq!(result.ok(), Some(json!({ fname: {"line_count": 2} })));
    }

    #[test]
    fn test_scale_runs_through_pipeline() {
        let catalog = InterfaceCatalog::standard();
        let Ok(Some(algorithm)) = define(scale(), &catalog).map(|d| d.into_concrete()) else {
            panic!("scale should define");
        };
        let result = algorithm.invoke(
            Payload::Data(json!({"a": [1, 2], "b": "label"})),
            CallArgs::new().kwarg("factor", 2.0),
        );
        assert_eq!(result.ok(), Some(json!({"a": [2.0, 4.0], "b": "label"})));
    }
}
