use crate::context::CliContext;
use crate::errors::CliError;
use crate::GlobalOpts;
use colored::Colorize;
use plugix_registry::InterfaceType;
use plugix_resolver::ResolveError;

/// List registered plugins, code interfaces first
pub fn list_plugins(interface: Option<String>, opts: &GlobalOpts) -> Result<(), CliError> {
    let ctx = CliContext::load()?;
    if let Some(name) = interface.as_deref() {
        if !ctx.registry.catalog().contains(name) {
            return Err(ResolveError::UnknownInterface(name.to_string()).into());
        }
    }

    let index = ctx.registry.snapshot();
    if index.is_empty() {
        println!("{}", "No plugins registered.".yellow());
        println!("Build the registry index with: plugix rebuild");
        return Ok(());
    }

    let mut printed = 0;
    for interface_type in [InterfaceType::Code, InterfaceType::Declarative] {
        for name in index.interfaces(interface_type) {
            if interface.as_deref().is_some_and(|wanted| wanted != name) {
                continue;
            }
            let entries = index.entries(interface_type, name);
            println!(
                "{} {}",
                name.bold().green(),
                format!("({}, {})", interface_type, entries.len()).dimmed()
            );
            for entry in entries {
                let family = entry.family.as_deref().unwrap_or("-");
                if opts.verbosity_level() > 0 {
                    println!(
                        "  {} {} {}",
                        entry.key.to_string().cyan(),
                        family.dimmed(),
                        format!("{}:{}", entry.package, entry.relpath).dimmed()
                    );
                } else {
                    println!("  {} {}", entry.key.to_string().cyan(), family.dimmed());
                }
            }
            printed += 1;
        }
    }

    if printed == 0 {
        if let Some(name) = interface {
            println!("{}", format!("No plugins registered for '{}'.", name).yellow());
        }
    }
    Ok(())
}
