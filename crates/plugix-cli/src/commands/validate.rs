use crate::commands::get::{self, GetCommand};
use crate::context::CliContext;
use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use colored::Colorize;
use plugix_contract::KeyShape;
use plugix_resolver::{InterfaceResolver, KeyStrategy, PluginRegistry, ResolveError};

#[derive(Debug, Clone, Default)]
pub struct ValidateCommand {
    pub interface: Option<String>,
    pub name: Option<String>,
    pub source: Option<String>,
}

/// Outcome of validating a set of plugins
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub checked: usize,
    /// `(plugin id, error)`
    pub failures: Vec<(String, String)>,
}

impl ValidationReport {
    fn record(&mut self, id: String, outcome: Result<(), String>) {
        self.checked += 1;
        if let Err(message) = outcome {
            self.failures.push((id, message));
        }
    }

    pub fn into_result(self) -> Result<usize, CliError> {
        if self.failures.is_empty() {
            Ok(self.checked)
        } else {
            Err(CliError::ValidationFailed {
                failed: self.failures.len(),
                checked: self.checked,
            })
        }
    }
}

pub fn handle_validate(cmd: ValidateCommand, opts: &GlobalOpts) -> Result<(), CliError> {
    let ctx = CliContext::load()?;
    let report = validate(&ctx.registry, &cmd)?;

    for (id, message) in &report.failures {
        println!("{} {}", "✗".red(), id.bold());
        println!("  {}", message);
    }
    if opts.verbosity_level() > 0 {
        logger::info(&format!("Checked {} plugin(s)", report.checked));
    }

    let checked = report.into_result()?;
    logger::success(&format!("{} plugin(s) valid", checked));
    Ok(())
}

/// Resolve every selected plugin without rebuilding the index
pub fn validate(registry: &PluginRegistry, cmd: &ValidateCommand) -> Result<ValidationReport, CliError> {
    let mut report = ValidationReport::default();

    if let Some((interface, name)) = cmd.interface.as_ref().zip(cmd.name.as_ref()) {
        let get_cmd = GetCommand {
            interface: interface.clone(),
            name: name.clone(),
            source: cmd.source.clone(),
            no_rebuild: true,
        };
        match get::resolve(registry, &get_cmd) {
            Ok(descriptor) => report.record(descriptor.id, Ok(())),
            Err(CliError::Resolve(e)) => report.record(format!("{}.{}", interface, name), Err(e.to_string())),
            Err(e) => return Err(e),
        }
        return Ok(report);
    }

    let interfaces: Vec<String> = match &cmd.interface {
        Some(interface) => {
            if !registry.catalog().contains(interface) {
                return Err(ResolveError::UnknownInterface(interface.clone()).into());
            }
            vec![interface.clone()]
        }
        None => registry
            .catalog()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    for interface in &interfaces {
        let shape = registry
            .catalog()
            .get(interface)
            .map_or(KeyShape::Flat, |definition| definition.key_shape);
        match shape {
            KeyShape::SourceAndName => check_interface(&registry.products()?, &mut report),
            KeyShape::Flat => check_interface(&registry.resolver(interface)?, &mut report),
        }
    }
    Ok(report)
}

fn check_interface<S: KeyStrategy>(resolver: &InterfaceResolver<S>, report: &mut ValidationReport) {
    for key in resolver.plugin_keys().iter() {
        let outcome = resolver
            .get_plugin_with(key.clone(), false)
            .map(|_| ())
            .map_err(|e| e.to_string());
        report.record(format!("{}.{}", resolver.interface(), key), outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugix_registry::{IndexFormat, IndexLayout, InterfaceType, PluginKey, RegistryEntry, RegistryIndex};
    use plugix_schema::{FamilySchema, FieldType, SchemaField, SchemaRegistry};
    use std::fs;
    use tempfile::TempDir;

    const GOOD: &str = "interface: sectors\nfamily: generated\nname: good\ndocstring: Good sector.\nspec:\n  area_id: good\n";
    const BAD: &str = "interface: sectors\nfamily: generated\nname: bad\ndocstring: Bad sector.\nspec:\n  bogus: 1\n";

    fn registry_with_sectors(dir: &TempDir) -> Option<PluginRegistry> {
        let layout = IndexLayout::new(dir.path());
        let mut entries = Vec::new();
        for (name, content) in [("good", GOOD), ("bad", BAD)] {
            let relpath = format!("plugins/{}.yaml", name);
            let path = dir.path().join("demo").join(&relpath);
            fs::create_dir_all(path.parent()?).ok()?;
            fs::write(&path, content).ok()?;
            entries.push(RegistryEntry::new(
                InterfaceType::Declarative,
                "sectors",
                PluginKey::name(name),
                "demo",
                &relpath,
            ));
        }
        RegistryIndex::from_entries(entries)
            .write_to_path(&layout.document_path(None, IndexFormat::Yaml), IndexFormat::Yaml)
            .ok()?;

        let schemas = SchemaRegistry::new()
            .with(
                FamilySchema::new("sectors.generated")
                    .field("area_id", SchemaField::new(FieldType::Str).required()),
            )
            .build()
            .ok()?;
        PluginRegistry::builder(layout)
            .schemas(schemas)
            .rebuild_on_miss(false)
            .build()
            .ok()
    }

    #[test]
    fn test_validate_reports_each_failure() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Some(registry) = registry_with_sectors(&temp_dir) else {
            panic!("fixture registry should build");
        };

        let cmd = ValidateCommand {
            interface: Some("sectors".to_string()),
            ..Default::default()
        };
        let Ok(report) = validate(&registry, &cmd) else {
            panic!("validate should produce a report");
        };
        assert_eq!(report.checked, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "sectors.bad");
        assert!(matches!(
            report.into_result(),
            Err(CliError::ValidationFailed { failed: 1, checked: 2 })
        ));
    }

    #[test]
    fn test_validate_single_plugin() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let Some(registry) = registry_with_sectors(&temp_dir) else {
            panic!("fixture registry should build");
        };

        let cmd = ValidateCommand {
            interface: Some("sectors".to_string()),
            name: Some("good".to_string()),
            source: None,
        };
        let report = validate(&registry, &cmd);
        assert!(report.is_ok_and(|r| r.into_result().is_ok_and(|checked| checked == 1)));
    }
}
