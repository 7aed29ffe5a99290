//! Package sources: where descriptors are discovered and archives obtained

mod local;
mod remote;

pub use local::{LocalDirectory, LocalPackage, LocalRepository, SpecificFile};
pub use remote::{CatalogEntry, HttpCatalog};

use crate::dependency::Dependency;
use crate::descriptor::PackageDescriptor;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Failure talking to a source or materializing an archive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Error fetching {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("Invalid catalog entry from {uri}: {message}")]
    InvalidEntry { uri: String, message: String },

    #[error("Checksum mismatch for {package}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("Cannot read package file {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl FetchError {
    /// Network-level failure, as opposed to bad data
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// Result of a catalog query: matches plus non-fatal lookup errors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    pub found: Vec<PackageDescriptor>,
    pub errors: Vec<FetchError>,
}

/// A remote package catalog
pub trait RemoteCatalog {
    /// Location shown in diagnostics
    fn uri(&self) -> &str;

    /// Descriptors matching `dependency` whose platform suits the host.
    ///
    /// Only transport failures are returned as `Err`; malformed entries are
    /// reported through [`CatalogQuery::errors`].
    fn query(&self, dependency: &Dependency) -> Result<CatalogQuery, FetchError>;

    /// Fetch the archive for `descriptor` into `cache_dir`
    fn download(
        &self,
        descriptor: &PackageDescriptor,
        cache_dir: &Path,
    ) -> Result<PathBuf, FetchError>;
}

/// Which side of the local/remote split a source sits on.
/// Local sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    Local,
    Remote,
}

/// Where a candidate descriptor was found
#[derive(Clone)]
pub enum Source {
    /// Archive in the local package directory
    Local(PathBuf),
    /// Archive named explicitly by path
    SpecificFile(PathBuf),
    Remote(Rc<dyn RemoteCatalog>),
}

impl Source {
    pub fn origin(&self) -> Origin {
        match self {
            Source::Local(_) | Source::SpecificFile(_) => Origin::Local,
            Source::Remote(_) => Origin::Remote,
        }
    }

    /// Make the archive for `descriptor` available on disk and return its path
    pub fn materialize(
        &self,
        descriptor: &PackageDescriptor,
        cache_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        match self {
            Source::Local(path) | Source::SpecificFile(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(FetchError::Io {
                        path: path.clone(),
                        message: "archive no longer exists".to_string(),
                    })
                }
            }
            Source::Remote(catalog) => catalog.download(descriptor, cache_dir),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(path) => f.debug_tuple("Local").field(path).finish(),
            Source::SpecificFile(path) => f.debug_tuple("SpecificFile").field(path).finish(),
            Source::Remote(catalog) => f.debug_tuple("Remote").field(&catalog.uri()).finish(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(path) | Source::SpecificFile(path) => write!(f, "{}", path.display()),
            Source::Remote(catalog) => f.write_str(catalog.uri()),
        }
    }
}

/// A descriptor paired with the source it was discovered from.
/// The descriptor is only ever installed through that source.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub descriptor: PackageDescriptor,
    pub source: Source,
}

impl Candidate {
    pub fn new(descriptor: PackageDescriptor, source: Source) -> Self {
        Self { descriptor, source }
    }

    /// Ranking used for discovery results: local before remote, then newer
    /// (higher descriptor ordering) first.
    pub fn preference(&self, other: &Candidate) -> Ordering {
        self.source
            .origin()
            .cmp(&other.source.origin())
            .then_with(|| other.descriptor.cmp(&self.descriptor))
    }
}
