//! Install command (depot install)

use anyhow::{Context, Result};
use depot_package::{
    ArchiveInstaller, Collaborators, ConfigLoader, DependencyInstaller, Domain, HttpCatalog,
    InstallRequest, InstalledPackages, InstallerOptions, LocalDirectory, PackageDescriptor,
    RemoteCatalog, Requirement,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

/// Arguments for the install command
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    /// Package name or archive path
    pub name: String,
    pub requirement: Option<String>,
    pub prerelease: bool,
    pub domain: Option<Domain>,
    pub force: bool,
    pub ignore_dependencies: bool,
    pub minimal_deps: bool,
    pub development: bool,
    pub dev_shallow: bool,
    pub install_dir: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub user_install: bool,
    pub no_wrappers: bool,
    pub env_shebang: bool,
    pub format_executable: bool,
    /// Catalog URLs; replace the configured list when non-empty
    pub sources: Vec<String>,
    /// Quiet output (errors only)
    pub quiet: bool,
}

/// Run the install command
pub fn run(args: InstallArgs) -> Result<()> {
    let config = ConfigLoader::new()
        .load()
        .context("Failed to load depot configuration")?;

    let options = apply_args(config.install, &args);
    let sources = if args.sources.is_empty() {
        config.sources
    } else {
        args.sources.clone()
    };

    let remotes = sources
        .iter()
        .map(|url| {
            HttpCatalog::new(url.as_str())
                .map(|catalog| Rc::new(catalog) as Rc<dyn RemoteCatalog>)
                .with_context(|| format!("Invalid package source {}", url))
        })
        .collect::<Result<Vec<_>>>()?;

    let request = build_request(&args)?;
    let local = LocalDirectory::current_dir().context("Failed to read current directory")?;
    let installed = InstalledPackages::load(&options.install_dir())
        .context("Failed to read installed packages")?;
    let archive_installer = ArchiveInstaller::new();

    let mut driver = DependencyInstaller::new(
        options,
        Collaborators {
            local: &local,
            remotes,
            installed: &installed,
            installer: &archive_installer,
        },
    )
    .context("Failed to prepare install directory")?;

    let spinner = (!args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        pb.set_message(format!("Installing {}...", args.name));
        pb
    });

    let result = driver.install(request);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if !args.quiet {
        for error in driver.errors() {
            eprintln!("warning: {}", error);
        }
    }

    let installed = result.with_context(|| format!("Failed to install {}", args.name))?;

    if !args.quiet {
        print!("{}", summary(&installed, driver.packages_to_install().len()));
    }

    Ok(())
}

/// Layer command-line flags over the configured options
fn apply_args(mut options: InstallerOptions, args: &InstallArgs) -> InstallerOptions {
    if let Some(domain) = args.domain {
        options.domain = domain;
    }
    options.force |= args.force;
    options.ignore_dependencies |= args.ignore_dependencies;
    options.prerelease |= args.prerelease;
    options.minimal_deps |= args.minimal_deps;
    options.development |= args.development;
    options.dev_shallow |= args.dev_shallow;
    options.user_install |= args.user_install;
    options.env_shebang |= args.env_shebang;
    options.format_executable |= args.format_executable;
    if args.no_wrappers {
        options.wrappers = false;
    }
    if let Some(dir) = &args.install_dir {
        options.install_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.bin_dir {
        options.bin_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.cache_dir {
        options.cache_dir = Some(dir.clone());
    }
    options
}

fn build_request(args: &InstallArgs) -> Result<InstallRequest> {
    let requirement = match &args.requirement {
        Some(req) => Requirement::parse(req)
            .with_context(|| format!("Invalid version requirement '{}'", req))?,
        None => Requirement::any(),
    };

    Ok(InstallRequest::ByName {
        name: args.name.clone(),
        requirement,
        prerelease: args.prerelease,
    })
}

fn summary(installed: &[PackageDescriptor], planned: usize) -> String {
    let mut out = String::new();

    if installed.is_empty() {
        out.push_str(&format!("{} Nothing installed.\n", green_check()));
        return out;
    }

    out.push_str(&format!(
        "{} {} {} installed",
        green_check(),
        installed.len(),
        if installed.len() == 1 {
            "package"
        } else {
            "packages"
        }
    ));
    let skipped = planned.saturating_sub(installed.len());
    if skipped > 0 {
        out.push_str(&format!(", {} skipped", skipped));
    }
    out.push('\n');

    for descriptor in installed {
        out.push_str(&format!("  {}\n", descriptor.full_name()));
    }
    out
}

/// Green checkmark
fn green_check() -> &'static str {
    "\u{2713}"
}
