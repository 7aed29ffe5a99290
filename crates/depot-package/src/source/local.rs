//! Local archive sources

use super::{Candidate, Source};
use crate::archive;
use crate::dependency::Dependency;
use crate::descriptor::PackageDescriptor;
use crate::Result;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A descriptor read from an archive on disk
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPackage {
    pub descriptor: PackageDescriptor,
    pub path: PathBuf,
}

impl LocalPackage {
    pub fn into_candidate(self) -> Candidate {
        Candidate::new(self.descriptor, Source::Local(self.path))
    }
}

/// Archives available without touching the network
pub trait LocalRepository {
    fn packages(&self) -> &[LocalPackage];

    /// Newest package called `name`, whatever its version
    fn newest(&self, name: &str) -> Option<&LocalPackage> {
        self.packages()
            .iter()
            .filter(|p| p.descriptor.name == name)
            .max_by(|a, b| a.descriptor.cmp(&b.descriptor))
    }

    /// Newest package satisfying `dependency`
    fn find(&self, dependency: &Dependency) -> Option<&LocalPackage> {
        self.packages()
            .iter()
            .filter(|p| dependency.matches_descriptor(&p.descriptor))
            .max_by(|a, b| a.descriptor.cmp(&b.descriptor))
    }
}

/// Directory of `*.pkg` archives, scanned once on first use
#[derive(Debug)]
pub struct LocalDirectory {
    root: PathBuf,
    packages: OnceCell<Vec<LocalPackage>>,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            packages: OnceCell::new(),
        }
    }

    /// The process working directory
    pub fn current_dir() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan(root: &Path) -> Vec<LocalPackage> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping local directory {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let mut packages = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !archive::is_archive(&path) {
                continue;
            }
            match archive::read_descriptor(&path) {
                Ok(descriptor) => packages.push(LocalPackage { descriptor, path }),
                Err(e) => debug!("Ignoring unreadable archive: {}", e),
            }
        }
        packages
    }
}

impl LocalRepository for LocalDirectory {
    fn packages(&self) -> &[LocalPackage] {
        self.packages.get_or_init(|| Self::scan(&self.root))
    }
}

/// An archive named explicitly by path
#[derive(Debug, Clone)]
pub struct SpecificFile {
    package: LocalPackage,
}

impl SpecificFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let descriptor = archive::read_descriptor(path)?;
        Ok(Self {
            package: LocalPackage {
                descriptor,
                path: path.to_path_buf(),
            },
        })
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.package.descriptor
    }

    pub fn into_candidate(self) -> Candidate {
        Candidate::new(
            self.package.descriptor,
            Source::SpecificFile(self.package.path),
        )
    }
}
