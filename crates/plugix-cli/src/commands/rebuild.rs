use crate::context::CliContext;
use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use plugix_registry::InterfaceType;

/// Run the indexer and reload the registry index
pub fn handle_rebuild(opts: &GlobalOpts) -> Result<(), CliError> {
    let ctx = CliContext::load()?;
    let before = ctx.registry.snapshot().len();
    let ticket = ctx.registry.rebuild()?;

    let index = ctx.registry.snapshot();
    logger::success(&format!(
        "Registry index rebuilt: {} plugin(s), {} before",
        index.len(),
        before
    ));
    if opts.verbosity_level() > 0 {
        for interface_type in InterfaceType::ALL {
            let interfaces = index.interfaces(interface_type);
            if !interfaces.is_empty() {
                logger::info(&format!("{}: {}", interface_type, interfaces.join(", ")));
            }
        }
        logger::debug(&format!("Index generation {}", ticket.generation()));
    }
    Ok(())
}
