//! plugix registry index
//!
//! This crate holds the in-memory form of the on-disk registry index documents
//! written by the external indexer. Each document maps
//! `interface_type -> interface_name -> plugin_key -> {package, relpath}`;
//! an installation carries either one merged document or one per package.
//!
//! The index is immutable once loaded. Reloads build a fresh [`RegistryIndex`]
//! and swap it into a [`SharedIndex`], so lookups in flight keep reading a
//! consistent snapshot.

pub mod document;
pub mod errors;
pub mod file_cache;
pub mod index;
pub mod layout;
pub mod shared;
pub mod types;

pub use document::IndexFormat;
pub use errors::RegistryError;
pub use index::RegistryIndex;
pub use layout::{IndexLayout, INDEX_STEM};
pub use shared::{RebuildTicket, SharedIndex};
pub use types::{InterfaceType, PluginKey, RegistryEntry};
