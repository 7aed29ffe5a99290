//! Installed-package registry

use crate::dependency::Dependency;
use crate::descriptor::PackageDescriptor;
use crate::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory under an install root holding one `<full_name>.toml` per installed package
pub const SPECIFICATIONS_DIR: &str = "specifications";

/// Read-only view of what is already installed
pub trait InstalledRegistry {
    /// Exact identity match
    fn contains(&self, descriptor: &PackageDescriptor) -> bool;

    fn any(&self, predicate: &dyn Fn(&PackageDescriptor) -> bool) -> bool;

    /// Some installed package has the dependency's name and a matching version
    fn satisfies(&self, dependency: &Dependency) -> bool {
        self.any(&|installed| dependency.matches_descriptor(installed))
    }
}

/// Installed packages held in memory
#[derive(Debug, Clone, Default)]
pub struct InstalledPackages {
    packages: BTreeSet<PackageDescriptor>,
}

impl InstalledPackages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = PackageDescriptor>) -> Self {
        Self {
            packages: descriptors.into_iter().collect(),
        }
    }

    /// Load every specification under `<install_dir>/specifications`.
    /// A missing directory means nothing is installed.
    pub fn load(install_dir: &Path) -> Result<Self> {
        let dir = Self::specifications_dir(install_dir);
        let mut packages = BTreeSet::new();

        if !dir.is_dir() {
            return Ok(Self { packages });
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        for path in paths {
            packages.insert(PackageDescriptor::from_file(&path)?);
        }

        debug!("{} installed package(s) in {}", packages.len(), dir.display());
        Ok(Self { packages })
    }

    pub fn specifications_dir(install_dir: &Path) -> PathBuf {
        install_dir.join(SPECIFICATIONS_DIR)
    }

    pub fn insert(&mut self, descriptor: PackageDescriptor) -> bool {
        self.packages.insert(descriptor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl InstalledRegistry for InstalledPackages {
    fn contains(&self, descriptor: &PackageDescriptor) -> bool {
        self.packages.contains(descriptor)
    }

    fn any(&self, predicate: &dyn Fn(&PackageDescriptor) -> bool) -> bool {
        self.packages.iter().any(predicate)
    }
}
