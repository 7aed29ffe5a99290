//! Installs package archives into an install root
//!
//! Layout:
//! - `packages/<full_name>/`: unpacked archive contents
//! - `specifications/<full_name>.toml`: installed descriptor
//! - `<bin_dir>/<exe>`: wrapper script or copy of each executable

use super::{ensure_layout, InstallConfig, InstallError, PackageInstaller};
use crate::archive;
use crate::descriptor::PackageDescriptor;
use crate::registry::InstalledPackages;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Written into each unpacked package directory
pub const RECEIPT_FILE: &str = ".depot-receipt.toml";

#[derive(Debug, Serialize)]
struct Receipt<'a> {
    package: &'a str,
    installed_at: String,
    development: bool,
    user_install: bool,
}

/// The bundled [`PackageInstaller`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveInstaller;

impl ArchiveInstaller {
    pub fn new() -> Self {
        Self
    }
}

impl PackageInstaller for ArchiveInstaller {
    fn install(
        &self,
        archive_path: &Path,
        config: &InstallConfig,
    ) -> Result<PackageDescriptor, InstallError> {
        let invalid = |reason: String| InstallError::InvalidArchive {
            path: archive_path.to_path_buf(),
            reason,
        };

        let descriptor = archive::read_descriptor(archive_path).map_err(|e| invalid(e.to_string()))?;
        let full_name = descriptor.full_name();
        let io = |source: std::io::Error| InstallError::Io {
            package: full_name.clone(),
            source,
        };

        if let Some(policy) = &config.security_policy {
            policy
                .verify(&descriptor, archive_path)
                .map_err(|reason| InstallError::Rejected {
                    package: full_name.clone(),
                    reason,
                })?;
        }

        ensure_layout(&config.install_dir).map_err(io)?;

        let package_dir = config.install_dir.join("packages").join(&full_name);
        if package_dir.exists() {
            debug!("Replacing {}", package_dir.display());
            std::fs::remove_dir_all(&package_dir).map_err(io)?;
        }
        archive::unpack(archive_path, &package_dir).map_err(|e| invalid(e.to_string()))?;

        let receipt = Receipt {
            package: &full_name,
            installed_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            development: config.development,
            user_install: config.user_install,
        };
        let receipt = toml::to_string(&receipt).map_err(|e| io(invalid_data(e)))?;
        std::fs::write(package_dir.join(RECEIPT_FILE), receipt).map_err(io)?;

        let spec_path = InstalledPackages::specifications_dir(&config.install_dir)
            .join(format!("{}.toml", full_name));
        let spec = descriptor.to_string().map_err(|e| io(invalid_data(e)))?;
        std::fs::write(&spec_path, spec).map_err(io)?;

        generate_bin(&descriptor, &package_dir, config).map_err(io)?;

        info!("Installed {} into {}", full_name, config.install_dir.display());
        Ok(descriptor)
    }
}

fn invalid_data(error: toml::ser::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, error)
}

/// Place each declared executable into the bin directory
fn generate_bin(
    descriptor: &PackageDescriptor,
    package_dir: &Path,
    config: &InstallConfig,
) -> std::io::Result<()> {
    if descriptor.executables.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(&config.bin_dir)?;

    for executable in &descriptor.executables {
        let source = package_dir.join("bin").join(executable);
        if !source.is_file() {
            warn!("{} declares missing executable {}", descriptor, executable);
            continue;
        }

        let target = config.bin_dir.join(executable_name(executable, config));
        if config.wrappers {
            std::fs::write(&target, wrapper_script(&source, config.env_shebang))?;
        } else {
            match std::fs::read_to_string(&source) {
                Ok(text) if config.env_shebang => {
                    std::fs::write(&target, rewrite_shebang(&text))?;
                }
                _ => {
                    std::fs::copy(&source, &target)?;
                }
            }
        }
        make_executable(&target)?;
        debug!("Placed {}", target.display());
    }

    Ok(())
}

fn executable_name(executable: &str, config: &InstallConfig) -> String {
    if config.format_executable {
        config.exec_format.replace("{}", executable)
    } else {
        executable.to_string()
    }
}

fn wrapper_script(target: &Path, env_shebang: bool) -> String {
    let shebang = if env_shebang {
        "#!/usr/bin/env sh"
    } else {
        "#!/bin/sh"
    };
    format!(
        "{}\n# Generated by depot\nexec \"{}\" \"$@\"\n",
        shebang,
        target.display()
    )
}

/// Turn `#!/path/to/interp args` into `#!/usr/bin/env interp args`
fn rewrite_shebang(text: &str) -> String {
    let Some(rest) = text.strip_prefix("#!") else {
        return text.to_string();
    };
    let (line, body) = match rest.split_once('\n') {
        Some((line, body)) => (line, Some(body)),
        None => (rest, None),
    };

    let mut parts = line.split_whitespace();
    let Some(interpreter) = parts.next() else {
        return text.to_string();
    };
    if interpreter == "/usr/bin/env" {
        return text.to_string();
    }

    let program = PathBuf::from(interpreter)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| interpreter.to_string());
    let args: Vec<&str> = parts.collect();

    let mut shebang = format!("#!/usr/bin/env {}", program);
    if !args.is_empty() {
        shebang.push(' ');
        shebang.push_str(&args.join(" "));
    }
    match body {
        Some(body) => format!("{}\n{}", shebang, body),
        None => shebang,
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
