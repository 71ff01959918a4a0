pub mod config;
pub mod describe;
pub mod get;
pub mod list;
pub mod rebuild;
pub mod validate;
