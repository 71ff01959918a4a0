use crate::config_manager::Config;
use crate::errors::CliError;
use crate::help_cache::{self, CommandHelp, HelpDocument};
use colored::Colorize;

/// Print extended help for `command`, or the command list
pub fn handle_describe(command: Option<String>) -> Result<(), CliError> {
    let config = Config::load()?;
    let help = help_cache::load(&config.get_cache_path())?;
    print!("{}", render(&help, command.as_deref())?);
    Ok(())
}

pub fn render(help: &HelpDocument, command: Option<&str>) -> Result<String, CliError> {
    let Some(command) = command else {
        let width = help.commands.keys().map(String::len).max().unwrap_or(0);
        let mut out = format!("{}\n", "Commands:".bold());
        for (name, entry) in &help.commands {
            out.push_str(&format!("  {:<width$}  {}\n", name.cyan(), entry.summary, width = width));
        }
        out.push_str("\nRun `plugix describe <COMMAND>` for details.\n");
        return Ok(out);
    };

    let entry = help
        .get(command)
        .ok_or_else(|| CliError::UnknownCommand(command.to_string()))?;
    Ok(render_command(command, entry))
}

fn render_command(name: &str, entry: &CommandHelp) -> String {
    let mut out = format!("{} - {}\n\n", name.bold().green(), entry.summary);
    out.push_str(&format!("{} {}\n", "Usage:".bold(), entry.usage));
    if !entry.details.trim().is_empty() {
        out.push('\n');
        for line in entry.details.trim_end().lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }
    if !entry.examples.is_empty() {
        out.push_str(&format!("\n{}\n", "Examples:".bold()));
        for example in &entry.examples {
            out.push_str(&format!("  $ {}\n", example));
        }
    }
    out
}
