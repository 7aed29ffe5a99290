//! Installation driver
//!
//! Resolves the requested package, installs the resulting plan in order
//! through a [`PackageInstaller`], then runs post-install hooks.

mod archive_installer;

pub use archive_installer::ArchiveInstaller;

use crate::config::InstallerOptions;
use crate::dependency::Dependency;
use crate::descriptor::PackageDescriptor;
use crate::finder::CandidateFinder;
use crate::registry::{InstalledRegistry, SPECIFICATIONS_DIR};
use crate::resolver::{GraphBuilder, Resolution, ResolveFlags};
use crate::source::{Candidate, FetchError, LocalRepository, RemoteCatalog, SpecificFile};
use crate::version::Requirement;
use crate::{HookError, PackageError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Subdirectories of an install root
pub const LAYOUT: [&str; 4] = [SPECIFICATIONS_DIR, "packages", "cache", "bin"];

/// Create the install root layout
pub fn ensure_layout(install_dir: &Path) -> std::io::Result<()> {
    for dir in LAYOUT {
        std::fs::create_dir_all(install_dir.join(dir))?;
    }
    Ok(())
}

/// What to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallRequest {
    /// A package name or a path to an archive
    ByName {
        name: String,
        requirement: Requirement,
        prerelease: bool,
    },
    ByDependency(Dependency),
}

impl InstallRequest {
    /// Any version of `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self::ByName {
            name: name.into(),
            requirement: Requirement::any(),
            prerelease: false,
        }
    }

    pub fn with_requirement(name: impl Into<String>, requirement: Requirement) -> Self {
        Self::ByName {
            name: name.into(),
            requirement,
            prerelease: false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ByName { name, .. } => name,
            Self::ByDependency(dependency) => &dependency.name,
        }
    }
}

impl From<Dependency> for InstallRequest {
    fn from(dependency: Dependency) -> Self {
        Self::ByDependency(dependency)
    }
}

/// Failure installing one package archive
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Package {package} rejected by security policy: {reason}")]
    Rejected { package: String, reason: String },

    #[error("Failed to install {package}: {source}")]
    Io {
        package: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid package archive {path}: {reason}")]
    InvalidArchive { path: PathBuf, reason: String },
}

/// Opaque trust check run against every archive before it is installed
pub trait SecurityPolicy: fmt::Debug {
    fn verify(&self, descriptor: &PackageDescriptor, archive: &Path) -> std::result::Result<(), String>;
}

/// Settings handed to the package installer for one archive
#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub install_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub development: bool,
    pub env_shebang: bool,
    pub force: bool,
    pub format_executable: bool,
    pub exec_format: String,
    pub ignore_dependencies: bool,
    pub security_policy: Option<Rc<dyn SecurityPolicy>>,
    pub user_install: bool,
    pub wrappers: bool,
}

/// Unpacks and places a single package archive
pub trait PackageInstaller {
    fn install(
        &self,
        archive: &Path,
        config: &InstallConfig,
    ) -> std::result::Result<PackageDescriptor, InstallError>;
}

/// Called once per [`DependencyInstaller::install`] with what was installed
pub type PostInstallHook<'a> = Box<
    dyn Fn(&DependencyInstaller<'a>, &[PackageDescriptor]) -> std::result::Result<(), HookError>
        + 'a,
>;

/// Everything the driver talks to
pub struct Collaborators<'a> {
    pub local: &'a dyn LocalRepository,
    pub remotes: Vec<Rc<dyn RemoteCatalog>>,
    pub installed: &'a dyn InstalledRegistry,
    pub installer: &'a dyn PackageInstaller,
}

/// Installs a package and its dependencies
pub struct DependencyInstaller<'a> {
    options: InstallerOptions,
    collaborators: Collaborators<'a>,
    hooks: Vec<PostInstallHook<'a>>,
    installed_packages: Vec<PackageDescriptor>,
    packages_to_install: Vec<PackageDescriptor>,
    errors: Vec<FetchError>,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(options: InstallerOptions, collaborators: Collaborators<'a>) -> Result<Self> {
        options.validate()?;

        if let Some(install_dir) = &options.install_dir {
            ensure_layout(install_dir)?;
        }

        Ok(Self {
            options,
            collaborators,
            hooks: Vec::new(),
            installed_packages: Vec::new(),
            packages_to_install: Vec::new(),
            errors: Vec::new(),
        })
    }

    /// Register a hook to run after every install, in registration order
    pub fn on_done_installing(
        &mut self,
        hook: impl Fn(&DependencyInstaller<'a>, &[PackageDescriptor]) -> std::result::Result<(), HookError>
            + 'a,
    ) {
        self.hooks.push(Box::new(hook));
    }

    pub fn options(&self) -> &InstallerOptions {
        &self.options
    }

    /// Packages installed by the last call
    pub fn installed_packages(&self) -> &[PackageDescriptor] {
        &self.installed_packages
    }

    /// Install order planned by the last call
    pub fn packages_to_install(&self) -> &[PackageDescriptor] {
        &self.packages_to_install
    }

    /// Non-fatal discovery errors from the last call
    pub fn errors(&self) -> &[FetchError] {
        &self.errors
    }

    /// Documentation kinds requested for installed packages
    pub fn document(&self) -> &[String] {
        &self.options.document
    }

    /// Install `request` and its dependencies, returning what was installed.
    ///
    /// Under `force`, packages whose download fails at the transport level are
    /// skipped and the rest still install.
    pub fn install(&mut self, request: InstallRequest) -> Result<Vec<PackageDescriptor>> {
        self.installed_packages.clear();
        self.packages_to_install.clear();
        self.errors.clear();

        let remotes = self.collaborators.remotes.clone();
        let mut finder =
            CandidateFinder::new(self.collaborators.local, &remotes, self.options.domain);

        let resolution = self.resolve(&mut finder, &request);
        self.errors = finder.take_errors();
        let resolution = resolution?;

        self.packages_to_install = resolution.descriptors().cloned().collect();
        self.install_plan(&resolution)?;

        let this: &Self = self;
        for hook in &this.hooks {
            hook(this, &this.installed_packages).map_err(PackageError::Hook)?;
        }

        Ok(self.installed_packages.clone())
    }

    fn resolve(
        &self,
        finder: &mut CandidateFinder<'_>,
        request: &InstallRequest,
    ) -> Result<Resolution> {
        let roots = self.find_roots(finder, request)?;
        debug!(
            "Resolving from {}",
            roots
                .iter()
                .map(|c| format!("{} ({})", c.descriptor, c.source))
                .collect::<Vec<_>>()
                .join(", ")
        );

        GraphBuilder::new(
            finder,
            self.collaborators.installed,
            ResolveFlags::from(&self.options),
        )
        .expand(roots)
    }

    fn find_roots(
        &self,
        finder: &mut CandidateFinder<'_>,
        request: &InstallRequest,
    ) -> Result<Vec<Candidate>> {
        match request {
            InstallRequest::ByName {
                name,
                requirement,
                prerelease,
            } => {
                let dependency = Dependency::new(name.clone(), requirement.clone())
                    .with_prerelease(*prerelease || self.options.prerelease);

                if finder.consider_local() {
                    let path = Path::new(name);
                    if path.is_file() {
                        return Ok(vec![SpecificFile::from_path(path)?.into_candidate()]);
                    }
                    if let Some(package) = finder.local().find(&dependency) {
                        return Ok(vec![package.clone().into_candidate()]);
                    }
                }

                finder
                    .find_candidates(&dependency)
                    .into_iter()
                    .find(|c| c.descriptor.platform.matches_current())
                    .map(|c| vec![c])
                    .ok_or_else(|| not_found(&dependency, finder))
            }
            InstallRequest::ByDependency(dependency) => {
                let dependency = dependency
                    .clone()
                    .with_prerelease(dependency.prerelease || self.options.prerelease);

                finder
                    .find_candidates(&dependency)
                    .into_iter()
                    .next()
                    .map(|c| vec![c])
                    .ok_or_else(|| not_found(&dependency, finder))
            }
        }
    }

    fn install_plan(&mut self, resolution: &Resolution) -> Result<()> {
        let cache_dir = self.options.cache_dir();
        let flags = ResolveFlags::from(&self.options);

        for entry in &resolution.plan {
            let descriptor = entry.descriptor();

            if !entry.is_root && self.collaborators.installed.contains(descriptor) {
                debug!("{} is already installed", descriptor);
                continue;
            }

            let archive = match entry.candidate.source.materialize(descriptor, &cache_dir) {
                Ok(path) => path,
                Err(e) if self.options.force && e.is_transport() => {
                    warn!("Skipping {}: {}", descriptor, e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            info!("Installing {}", descriptor.full_name());
            let config = self.install_config(flags.includes_development(entry.is_root));
            let installed = self.collaborators.installer.install(&archive, &config)?;
            self.installed_packages.push(installed);
        }

        Ok(())
    }

    fn install_config(&self, development: bool) -> InstallConfig {
        InstallConfig {
            install_dir: self.options.install_dir(),
            bin_dir: self.options.bin_dir(),
            development,
            env_shebang: self.options.env_shebang,
            force: self.options.force,
            format_executable: self.options.format_executable,
            exec_format: self.options.exec_format.clone(),
            ignore_dependencies: self.options.ignore_dependencies,
            security_policy: self.options.security_policy.clone(),
            user_install: self.options.user_install,
            wrappers: self.options.wrappers,
        }
    }
}

fn not_found(dependency: &Dependency, finder: &CandidateFinder<'_>) -> PackageError {
    PackageError::NotFound {
        name: dependency.name.clone(),
        requirement: dependency.requirement.clone(),
        errors: finder.errors().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_named_request() {
        let request = InstallRequest::named("widget");
        assert_eq!(request.name(), "widget");
        assert!(matches!(
            request,
            InstallRequest::ByName { ref requirement, prerelease: false, .. } if requirement.is_any()
        ));

        let request: InstallRequest = Dependency::any("gear").into();
        assert_eq!(request.name(), "gear");
    }

    #[test]
    fn test_ensure_layout() {
        let temp = TempDir::new().unwrap();
        ensure_layout(temp.path()).unwrap();
        for dir in LAYOUT {
            assert!(temp.path().join(dir).is_dir(), "missing {}", dir);
        }
    }
}
