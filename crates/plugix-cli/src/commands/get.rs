use crate::context::CliContext;
use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use colored::Colorize;
use plugix_contract::{Invoke, KeyShape};
use plugix_resolver::{PluginBody, PluginDescriptor, PluginRegistry, ResolveError};

#[derive(Debug, Clone)]
pub struct GetCommand {
    pub interface: String,
    pub name: String,
    pub source: Option<String>,
    pub no_rebuild: bool,
}

pub fn handle_get(cmd: GetCommand, opts: &GlobalOpts) -> Result<(), CliError> {
    let ctx = CliContext::load()?;
    let descriptor = resolve(&ctx.registry, &cmd)?;
    print!("{}", render_descriptor(&descriptor, opts.verbosity_level() > 0)?);
    Ok(())
}

/// Resolve the plugin named by `cmd`, honoring its key shape
pub fn resolve(registry: &PluginRegistry, cmd: &GetCommand) -> Result<PluginDescriptor, CliError> {
    let definition = registry
        .catalog()
        .get(&cmd.interface)
        .ok_or_else(|| ResolveError::UnknownInterface(cmd.interface.clone()))?;
    let rebuild = registry.rebuild_on_miss() && !cmd.no_rebuild;

    let descriptor = match definition.key_shape {
        KeyShape::SourceAndName => {
            let source = cmd
                .source
                .as_deref()
                .ok_or_else(|| CliError::SourceRequired(cmd.interface.clone()))?;
            registry
                .products()?
                .get_plugin_with((source, cmd.name.as_str()), rebuild)?
        }
        KeyShape::Flat => {
            if let Some(source) = &cmd.source {
                logger::warn(&format!(
                    "Interface '{}' is keyed by name only; ignoring --source {}",
                    cmd.interface, source
                ));
            }
            registry
                .resolver(&cmd.interface)?
                .get_plugin_with(cmd.name.as_str(), rebuild)?
        }
    };
    Ok(descriptor)
}

/// Human-readable summary of a resolved plugin
pub fn render_descriptor(descriptor: &PluginDescriptor, verbose: bool) -> Result<String, CliError> {
    let mut out = format!(
        "{} {}\n",
        descriptor.id.bold().green(),
        format!("({})", descriptor.family).dimmed()
    );
    if !descriptor.docstring.is_empty() {
        out.push_str(&format!("{}\n", descriptor.docstring.trim()));
    }
    if verbose {
        out.push_str(&format!(
            "{} {}:{}\n",
            "Location:".cyan(),
            descriptor.package,
            descriptor.relpath
        ));
        out.push_str(&format!("{} {}\n", "Path:".cyan(), descriptor.abspath.display()));
    }

    match &descriptor.body {
        PluginBody::Callable(plugin) => {
            out.push_str(&format!(
                "{} {}{}\n",
                "Signature:".cyan(),
                plugin.name(),
                plugin.signature()
            ));
        }
        PluginBody::Spec(document) => {
            let yaml = serde_yaml::to_string(&document.spec).map_err(|e| CliError::Render(e.to_string()))?;
            out.push_str(&format!("{}\n", "Spec:".cyan()));
            for line in yaml.lines() {
                out.push_str(&format!("  {}\n", line));
            }
            if !document.items.is_empty() {
                out.push_str(&format!("{} {}\n", "Items:".cyan(), document.items.len()));
                for item in &document.items {
                    out.push_str(&format!("  {} ({})\n", item.name, item.family));
                }
            }
        }
    }
    Ok(out)
}
