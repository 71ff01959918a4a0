use crate::config_manager::{Config, ConfigError};
use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::Colorize;
use std::fs;
use std::path::Path;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the current configuration (default)
    Show,
    /// Set a configuration key
    Set { key: String, value: String },
    /// Get or set the path to the config file.
    /// If `new_path` is provided, later runs read the configuration from there.
    /// If omitted, the CLI prints the current configuration file path.
    Path {
        /// Optional new config path to set
        new_path: Option<String>,
    },
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> Result<(), CliError> {
    run(
        action.unwrap_or(ConfigAction::Show),
        &Config::path(),
        &Config::pointer_path(),
        opts,
    )
}

fn run(action: ConfigAction, config_path: &Path, pointer_path: &Path, opts: &GlobalOpts) -> Result<(), CliError> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_from_path(config_path)?;
            println!("{}", "Configuration:".bold().green());
            if config.is_empty() {
                if opts.verbosity_level() > 0 {
                    println!("  {}", "(empty)".yellow());
                }
            } else {
                for (key, value) in config.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
                for (package, root) in config.package_roots() {
                    println!("  {} {}: {}", "package".cyan(), package, root.display());
                }
                for (interface, field) in config.validator_keys() {
                    println!("  {} {}: {}", "validator-key".cyan(), interface, field);
                }
            }
            if opts.verbosity_level() > 0 {
                println!("  {}: {}", "resolved index-dir".dimmed(), config.get_index_dir().display());
                println!("  {}: {}", "resolved schema-dir".dimmed(), config.get_schema_dir().display());
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from_path(config_path)?;
            config.set(&key, value.clone())?;
            config.save_to_path(config_path)?;
            logger::success(&format!("Set {} = {}", key, value));
        }
        ConfigAction::Path { new_path } => {
            logger::debug(&format!("Reading config from: {}", config_path.display()));
            match new_path {
                Some(p) => {
                    write_pointer(pointer_path, &p)?;
                    logger::success(&format!("Config path set to {}", p));
                }
                None => {
                    println!("{}", config_path.display());
                    if let Ok(contents) = fs::read_to_string(pointer_path) {
                        let trimmed = contents.trim();
                        if !trimmed.is_empty() {
                            println!("{} {}", "overridden-by".cyan(), trimmed);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn write_pointer(pointer_path: &Path, target: &str) -> Result<(), CliError> {
    let io_error = |path: &Path, source: std::io::Error| {
        CliError::Config(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    if let Some(parent) = pointer_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    fs::write(pointer_path, target.as_bytes()).map_err(|e| io_error(pointer_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn normal_opts() -> GlobalOpts {
        GlobalOpts {
            quiet: false,
            verbose: 0,
        }
    }

    #[test]
    fn test_config_set_and_show() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let config_path = temp_dir.path().join("plugix.toml");
        let pointer_path = temp_dir.path().join(".plugix_config_path");

        let set = ConfigAction::Set {
            key: "rebuild-on-miss".to_string(),
            value: "false".to_string(),
        };
        assert!(run(set, &config_path, &pointer_path, &normal_opts()).is_ok());
        assert!(Config::load_from_path(&config_path).is_ok_and(|c| !c.rebuild_on_miss()));
        assert!(run(ConfigAction::Show, &config_path, &pointer_path, &normal_opts()).is_ok());
    }

    #[test]
    fn test_config_set_rejects_bad_input() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let config_path = temp_dir.path().join("plugix.toml");
        let pointer_path = temp_dir.path().join(".plugix_config_path");

        let unknown = ConfigAction::Set {
            key: "bogus".to_string(),
            value: "1".to_string(),
        };
        assert!(matches!(
            run(unknown, &config_path, &pointer_path, &normal_opts()),
            Err(CliError::Config(ConfigError::UnknownKey(_)))
        ));

        let invalid = ConfigAction::Set {
            key: "rebuild-timeout-secs".to_string(),
            value: "soon".to_string(),
        };
        assert!(matches!(
            run(invalid, &config_path, &pointer_path, &normal_opts()),
            Err(CliError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(!config_path.exists());
    }

    #[test]
    fn test_config_path_writes_pointer() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let config_path = temp_dir.path().join("plugix.toml");
        let pointer_path = temp_dir.path().join("nested").join(".plugix_config_path");

        let action = ConfigAction::Path {
            new_path: Some("/srv/plugix/plugix.toml".to_string()),
        };
        assert!(run(action, &config_path, &pointer_path, &normal_opts()).is_ok());
        assert!(fs::read_to_string(&pointer_path).is_ok_and(|c| c == "/srv/plugix/plugix.toml"));
    }
}
