//! Depot package installation
//!
//! Resolves a requested package together with its transitive dependencies
//! from local archives and remote catalogs, orders the result so
//! dependencies come first, and installs it.

pub mod archive;
pub mod config;
pub mod dependency;
pub mod dependency_list;
pub mod descriptor;
pub mod finder;
pub mod installer;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod version;

pub use config::{ConfigError, ConfigFile, ConfigLoader, Domain, InstallerOptions};
pub use dependency::{Dependency, DependencyKind};
pub use dependency_list::{DependencyList, DependencyReport};
pub use descriptor::{PackageDescriptor, Platform};
pub use finder::CandidateFinder;
pub use installer::{
    ArchiveInstaller, Collaborators, DependencyInstaller, InstallConfig, InstallError,
    InstallRequest, PackageInstaller, PostInstallHook, SecurityPolicy,
};
pub use registry::{InstalledPackages, InstalledRegistry};
pub use resolver::{GraphBuilder, PlannedInstall, Resolution, ResolveFlags};
pub use source::{
    Candidate, CatalogEntry, CatalogQuery, FetchError, HttpCatalog, LocalDirectory, LocalPackage,
    LocalRepository, Origin, RemoteCatalog, Source, SpecificFile,
};
pub use version::Requirement;

/// Error returned by a post-install hook
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Package management errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Could not find a valid package '{name}' ({requirement}) locally or in a repository")]
    NotFound {
        name: String,
        requirement: Requirement,
        errors: Vec<FetchError>,
    },

    #[error("Unable to resolve dependencies: {0}")]
    Unresolvable(DependencyReport),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("Post-install hook failed: {0}")]
    Hook(HookError),

    #[error("Failed to parse descriptor: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize descriptor: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Semver error: {0}")]
    SemverError(#[from] semver::Error),

    #[error("Invalid package archive {path}: {reason}")]
    InvalidArchive {
        path: std::path::PathBuf,
        reason: String,
    },

    #[error("Invalid field value: {field} - {reason}")]
    InvalidField { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PackageError>;
