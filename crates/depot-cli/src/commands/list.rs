//! List command (depot list)

use anyhow::{Context, Result};
use depot_package::{ConfigLoader, InstalledPackages};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    /// Overrides the configured install directory
    pub install_dir: Option<PathBuf>,
}

pub fn run(args: ListArgs) -> Result<()> {
    let mut options = ConfigLoader::new()
        .load()
        .context("Failed to load depot configuration")?
        .install;
    if let Some(dir) = args.install_dir {
        options.install_dir = Some(dir);
    }

    let install_dir = options.install_dir();
    let installed = InstalledPackages::load(&install_dir)
        .with_context(|| format!("Failed to read packages in {}", install_dir.display()))?;

    print!("{}", render(&installed));
    Ok(())
}

/// One `name (version[, platform])` line per package, sorted by name then version
fn render(installed: &InstalledPackages) -> String {
    if installed.is_empty() {
        return "No packages installed.\n".to_string();
    }

    installed
        .iter()
        .map(|descriptor| {
            if descriptor.platform.is_any() {
                format!("{} ({})\n", descriptor.name, descriptor.version)
            } else {
                format!(
                    "{} ({}, {})\n",
                    descriptor.name, descriptor.version, descriptor.platform
                )
            }
        })
        .collect()
}
