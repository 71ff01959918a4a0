//! Configuration and registry shared by the commands that resolve plugins

use crate::builtins;
use crate::errors::CliError;
use plugix_config::Config;
use plugix_resolver::PluginRegistry;
use tracing::debug;

#[derive(Debug)]
pub struct CliContext {
    pub config: Config,
    pub registry: PluginRegistry,
}

impl CliContext {
    pub fn load() -> Result<Self, CliError> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, CliError> {
        let registry = PluginRegistry::from_config(&config, builtins::code_registry())?;
        debug!(
            "Registry ready: {} plugins at generation {}",
            registry.snapshot().len(),
            registry.generation()
        );
        Ok(CliContext { config, registry })
    }
}
