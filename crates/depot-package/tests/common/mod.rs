//! Shared fixtures: archive builders and recording collaborators

#![allow(dead_code)]

use depot_package::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use semver::Version;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::result::Result;
use tempfile::TempDir;

pub fn pkg(name: &str, version: &str) -> PackageDescriptor {
    PackageDescriptor::new(name, Version::parse(version).unwrap())
}

pub fn dep(name: &str, req: &str) -> Dependency {
    Dependency::parse(name, req).unwrap()
}

/// Write `<dir>/<full_name>.pkg` holding the descriptor
pub fn write_archive(dir: &Path, descriptor: &PackageDescriptor) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(archive::file_name(descriptor));
    let file = std::fs::File::create(&path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let manifest = descriptor.to_string().unwrap();
    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, archive::DESCRIPTOR_FILE, manifest.as_bytes())
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap();
    path
}

/// A scratch workspace with a local package directory and a cache
pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn local_dir(&self) -> PathBuf {
        self.temp.path().join("local")
    }

    pub fn install_dir(&self) -> PathBuf {
        self.temp.path().join("home")
    }

    /// Drop archives into the local package directory
    pub fn with_local(self, descriptors: &[PackageDescriptor]) -> Self {
        for descriptor in descriptors {
            write_archive(&self.local_dir(), descriptor);
        }
        self
    }

    pub fn local(&self) -> LocalDirectory {
        LocalDirectory::new(self.local_dir())
    }

    pub fn options(&self) -> InstallerOptions {
        InstallerOptions {
            install_dir: Some(self.install_dir()),
            ..Default::default()
        }
    }
}

/// In-memory catalog that records queries and serves generated archives
pub struct FakeCatalog {
    uri: String,
    listed: Vec<PackageDescriptor>,
    offline: bool,
    broken_downloads: HashSet<String>,
    pub queries: RefCell<Vec<String>>,
}

impl FakeCatalog {
    pub fn new(uri: &str, listed: Vec<PackageDescriptor>) -> Self {
        Self {
            uri: uri.to_string(),
            listed,
            offline: false,
            broken_downloads: HashSet::new(),
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Every query fails at the transport level
    pub fn offline(uri: &str) -> Self {
        Self {
            offline: true,
            ..Self::new(uri, Vec::new())
        }
    }

    /// Downloads of `full_name` fail at the transport level
    pub fn breaking_download(mut self, full_name: &str) -> Self {
        self.broken_downloads.insert(full_name.to_string());
        self
    }

    pub fn queried(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }

    fn transport(&self, message: &str) -> FetchError {
        FetchError::Transport {
            uri: self.uri.clone(),
            message: message.to_string(),
        }
    }
}

impl RemoteCatalog for FakeCatalog {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn query(&self, dependency: &Dependency) -> Result<CatalogQuery, FetchError> {
        self.queries.borrow_mut().push(dependency.name.clone());
        if self.offline {
            return Err(self.transport("connection refused"));
        }
        Ok(CatalogQuery {
            found: self
                .listed
                .iter()
                .filter(|d| dependency.matches_descriptor(d))
                .cloned()
                .collect(),
            errors: Vec::new(),
        })
    }

    fn download(
        &self,
        descriptor: &PackageDescriptor,
        cache_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        if self.offline || self.broken_downloads.contains(&descriptor.full_name()) {
            return Err(self.transport("connection reset"));
        }
        Ok(write_archive(&cache_dir.join("cache"), descriptor))
    }
}

/// Package installer that only records what it was asked to install
#[derive(Default)]
pub struct RecordingInstaller {
    pub calls: RefCell<Vec<(String, bool)>>,
}

impl RecordingInstaller {
    /// `(full_name, development)` per call
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.borrow().clone()
    }
}

impl PackageInstaller for RecordingInstaller {
    fn install(
        &self,
        archive_path: &Path,
        config: &InstallConfig,
    ) -> Result<PackageDescriptor, InstallError> {
        let descriptor =
            archive::read_descriptor(archive_path).map_err(|e| InstallError::InvalidArchive {
                path: archive_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.calls
            .borrow_mut()
            .push((descriptor.full_name(), config.development));
        Ok(descriptor)
    }
}

pub fn remotes(catalogs: &[Rc<FakeCatalog>]) -> Vec<Rc<dyn RemoteCatalog>> {
    catalogs
        .iter()
        .map(|c| Rc::clone(c) as Rc<dyn RemoteCatalog>)
        .collect()
}

pub fn full_names(descriptors: &[PackageDescriptor]) -> Vec<String> {
    descriptors.iter().map(PackageDescriptor::full_name).collect()
}
