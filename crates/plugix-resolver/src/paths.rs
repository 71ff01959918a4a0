//! Where installed packages live on disk

use plugix_config::Config;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Package name to root directory
///
/// Packages without an explicit root are expected under the plugin root as
/// `<plugin_root>/<package>`.
#[derive(Debug, Clone, Default)]
pub struct PackageRoots {
    roots: BTreeMap<String, PathBuf>,
    plugin_root: PathBuf,
}

impl PackageRoots {
    pub fn new(plugin_root: impl Into<PathBuf>) -> Self {
        PackageRoots {
            roots: BTreeMap::new(),
            plugin_root: plugin_root.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        PackageRoots {
            roots: config.package_roots(),
            plugin_root: config.get_plugin_root(),
        }
    }

    pub fn with_root(mut self, package: &str, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(package.to_string(), root.into());
        self
    }

    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    pub fn root(&self, package: &str) -> PathBuf {
        self.roots
            .get(package)
            .cloned()
            .unwrap_or_else(|| self.plugin_root.join(package))
    }

    pub fn abspath(&self, package: &str, relpath: &str) -> PathBuf {
        self.root(package).join(relpath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_root_wins_over_plugin_root() {
        let roots = PackageRoots::new("/opt/plugins").with_root("core", "/srv/core");
        assert_eq!(
            roots.abspath("core", "plugins/yaml/products/abi.yaml"),
            PathBuf::from("/srv/core/plugins/yaml/products/abi.yaml")
        );
        assert_eq!(
            roots.abspath("extra", "readers/foo"),
            PathBuf::from("/opt/plugins/extra/readers/foo")
        );
    }
}
