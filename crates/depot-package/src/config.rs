//! Installer configuration
//!
//! Options are merged from, lowest priority first:
//! 1. Built-in defaults ([`InstallerOptions::default`])
//! 2. Global config (`~/.depot/config.toml`)
//! 3. Environment variables (`DEPOT_*`)
//! 4. CLI flags (applied by the caller)

use crate::installer::SecurityPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which sources take part in discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Local,
    Remote,
    #[default]
    Both,
}

impl Domain {
    pub fn consider_local(self) -> bool {
        matches!(self, Domain::Local | Domain::Both)
    }

    pub fn consider_remote(self) -> bool {
        matches!(self, Domain::Remote | Domain::Both)
    }
}

impl FromStr for Domain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Domain::Local),
            "remote" => Ok(Domain::Remote),
            "both" => Ok(Domain::Both),
            other => Err(ConfigError::InvalidValue {
                field: "domain".to_string(),
                reason: format!("must be 'local', 'remote' or 'both', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Domain::Local => "local",
            Domain::Remote => "remote",
            Domain::Both => "both",
        })
    }
}

/// Options for one installer instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct InstallerOptions {
    pub domain: Domain,
    /// Tolerate per-package download failures and skip validation
    pub force: bool,
    pub ignore_dependencies: bool,
    /// Allow prerelease versions for the requested package
    pub prerelease: bool,
    /// Skip discovery for dependencies an installed package already satisfies
    pub minimal_deps: bool,
    pub development: bool,
    /// With `development`, only include development dependencies of the
    /// requested packages
    pub dev_shallow: bool,
    pub wrappers: bool,
    pub env_shebang: bool,
    pub format_executable: bool,
    /// Executable name template used with `format_executable`, `{}` is the name
    pub exec_format: String,
    /// Documentation kinds handed to post-install hooks
    pub document: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    pub user_install: bool,
    #[serde(skip)]
    pub security_policy: Option<Rc<dyn SecurityPolicy>>,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            domain: Domain::Both,
            force: false,
            ignore_dependencies: false,
            prerelease: false,
            minimal_deps: false,
            development: false,
            dev_shallow: false,
            wrappers: true,
            env_shebang: false,
            format_executable: false,
            exec_format: "{}".to_string(),
            document: vec!["api".to_string()],
            install_dir: None,
            bin_dir: None,
            cache_dir: None,
            user_install: false,
            security_policy: None,
        }
    }
}

impl InstallerOptions {
    /// Where packages are installed
    pub fn install_dir(&self) -> PathBuf {
        if let Some(dir) = &self.install_dir {
            return dir.clone();
        }
        if self.user_install {
            if let Some(home) = dirs::home_dir() {
                return home.join(".depot");
            }
        }
        default_install_dir()
    }

    /// Where downloaded archives are cached; defaults to the install dir
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.install_dir())
    }

    /// Where executables are placed
    pub fn bin_dir(&self) -> PathBuf {
        self.bin_dir
            .clone()
            .unwrap_or_else(|| self.install_dir().join("bin"))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.exec_format.contains("{}") {
            return Err(ConfigError::InvalidValue {
                field: "exec-format".to_string(),
                reason: format!("'{}' has no '{{}}' placeholder", self.exec_format),
            });
        }
        Ok(())
    }
}

/// `$DEPOT_HOME`, else the platform data directory
fn default_install_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("DEPOT_HOME") {
        return PathBuf::from(home);
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("depot"))
        .unwrap_or_else(|| PathBuf::from(".depot"))
}

/// Global configuration file (~/.depot/config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub install: InstallerOptions,
    /// Remote catalog base URLs
    pub sources: Vec<String>,
}

impl ConfigFile {
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.install.validate()?;
        Ok(config)
    }

    /// ~/.depot/config.toml
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".depot").join("config.toml"))
    }
}

/// Loads the global config and applies `DEPOT_*` environment overrides
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Read from `path` instead of ~/.depot/config.toml
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    pub fn load(&self) -> ConfigResult<ConfigFile> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => ConfigFile::global_config_path()?,
        };

        // the config file is optional
        let config = if path.exists() {
            ConfigFile::load_from_file(&path)?
        } else {
            ConfigFile::default()
        };

        apply_env_overrides(config, |key| std::env::var(key).ok())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `DEPOT_DOMAIN`, `DEPOT_INSTALL_DIR` and `DEPOT_SOURCES` (comma separated)
pub fn apply_env_overrides(
    mut config: ConfigFile,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<ConfigFile> {
    if let Some(domain) = lookup("DEPOT_DOMAIN") {
        config.install.domain = domain.parse()?;
    }

    if let Some(dir) = lookup("DEPOT_INSTALL_DIR") {
        config.install.install_dir = Some(PathBuf::from(dir));
    }

    if let Some(sources) = lookup("DEPOT_SOURCES") {
        config.sources = sources
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    Ok(config)
}
