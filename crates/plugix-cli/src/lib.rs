//! plugix command-line library - expose modules for testing

pub mod builtins;
pub mod commands;
pub mod common;
pub mod context;
pub mod errors;
pub mod help_cache;

pub use common::GlobalOpts;
pub use plugix_config as config_manager;
pub use plugix_logger as logger;
