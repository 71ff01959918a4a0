//! Discovery of index documents inside an index directory
//!
//! Two layouts are accepted:
//! - a merged document `<dir>/registered_plugins.{json,yaml,yml}`
//! - one document per package, `<dir>/<package>/registered_plugins.{json,yaml,yml}`
//!
//! The merged document wins when both are present.

use crate::document::IndexFormat;
use crate::errors::RegistryError;
use crate::index::RegistryIndex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File stem of every index document
pub const INDEX_STEM: &str = "registered_plugins";

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

#[derive(Debug, Clone)]
pub struct IndexLayout {
    dir: PathBuf,
    packages: Option<Vec<String>>,
}

impl IndexLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        IndexLayout {
            dir: dir.into(),
            packages: None,
        }
    }

    /// Restrict discovery to the given package names
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages = Some(packages.into_iter().map(Into::into).collect());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the merged document, if one exists
    pub fn merged_document(&self) -> Option<PathBuf> {
        find_document(&self.dir)
    }

    /// Per-package documents, sorted by package name
    pub fn package_documents(&self) -> Vec<PathBuf> {
        let Ok(read_dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut found: Vec<(String, PathBuf)> = read_dir
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| {
                let package = entry.file_name().to_string_lossy().to_string();
                if !self.accepts(&package) {
                    return None;
                }
                find_document(&entry.path()).map(|path| (package, path))
            })
            .collect();

        found.sort_by(|a, b| a.0.cmp(&b.0));
        found.into_iter().map(|(_, path)| path).collect()
    }

    fn accepts(&self, package: &str) -> bool {
        self.packages
            .as_ref()
            .map_or(true, |packages| packages.iter().any(|p| p == package))
    }

    /// Documents to load, merged document first
    pub fn discover(&self) -> Vec<PathBuf> {
        match self.merged_document() {
            Some(merged) => vec![merged],
            None => self.package_documents(),
        }
    }

    /// Load the index found in this layout
    ///
    /// Nothing discovered is [`RegistryError::NeedsRebuild`].
    pub fn load(&self) -> Result<RegistryIndex, RegistryError> {
        if let Some(merged) = self.merged_document() {
            debug!("Loading merged registry index {}", merged.display());
            let index = RegistryIndex::load(&[merged])?;
            return Ok(match &self.packages {
                Some(packages) => packages
                    .iter()
                    .map(|package| index.filter_package(package))
                    .reduce(|acc, next| acc.merge(&next))
                    .unwrap_or_default(),
                None => index,
            });
        }

        let documents = self.package_documents();
        if documents.is_empty() {
            return Err(RegistryError::NeedsRebuild {
                reason: format!("no registry index documents in {}", self.dir.display()),
            });
        }
        debug!(
            "Loading {} per-package registry documents from {}",
            documents.len(),
            self.dir.display()
        );
        RegistryIndex::load(&documents)
    }

    /// Where the indexer is expected to write a document
    pub fn document_path(&self, package: Option<&str>, format: IndexFormat) -> PathBuf {
        let file_name = format!("{}.{}", INDEX_STEM, format.extension());
        match package {
            Some(package) => self.dir.join(package).join(file_name),
            None => self.dir.join(file_name),
        }
    }
}

fn find_document(dir: &Path) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", INDEX_STEM, ext)))
        .find(|path| path.is_file())
}
