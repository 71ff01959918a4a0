//! Extended command help, shipped as YAML and cached as JSON
//!
//! The YAML source is embedded in the binary and materialized under the cache
//! directory. It is parsed once into `commands.json` and re-derived whenever
//! the source is newer than the cache.

use crate::errors::CliError;
use plugix_registry::file_cache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const EMBEDDED_HELP: &str = include_str!("../help/commands.yaml");
pub const HELP_SOURCE_NAME: &str = "commands.yaml";
pub const HELP_CACHE_NAME: &str = "commands.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandHelp {
    pub summary: String,
    pub usage: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelpDocument {
    pub commands: BTreeMap<String, CommandHelp>,
}

impl HelpDocument {
    pub fn get(&self, command: &str) -> Option<&CommandHelp> {
        self.commands.get(command)
    }
}

/// Load the help document through the cache in `cache_dir`
pub fn load(cache_dir: &Path) -> Result<HelpDocument, CliError> {
    let source = cache_dir.join(HELP_SOURCE_NAME);
    materialize_source(&source)?;
    Ok(file_cache::load_cached(&source, &cache_dir.join(HELP_CACHE_NAME))?)
}

/// Write the embedded YAML unless an identical copy is already there
fn materialize_source(source: &Path) -> Result<(), CliError> {
    if fs::read_to_string(source).is_ok_and(|current| current == EMBEDDED_HELP) {
        return Ok(());
    }
    if let Some(parent) = source.parent() {
        fs::create_dir_all(parent).map_err(|e| CliError::HelpCache {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(source, EMBEDDED_HELP).map_err(|e| CliError::HelpCache {
        path: source.to_path_buf(),
        source: e,
    })
}
