//! Package descriptors (package.toml) and platform tags

use crate::dependency::{Dependency, DependencyKind};
use semver::Version;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Platform a package was built for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Platform(String);

impl Platform {
    const ANY: &'static str = "any";

    /// Portable package, installable everywhere
    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    /// Tag of the host, `<arch>-<os>`
    pub fn current() -> Self {
        Self(format!(
            "{}-{}",
            std::env::consts::ARCH,
            std::env::consts::OS
        ))
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    pub fn matches_current(&self) -> bool {
        self.is_any() || *self == Self::current()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::any()
    }
}

impl From<String> for Platform {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Self::any()
        } else {
            Self(value)
        }
    }
}

impl From<&str> for Platform {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Platform> for String {
    fn from(value: Platform) -> Self {
        value.0
    }
}

impl Ord for Platform {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_any(), other.is_any()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Platform {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for one installable package.
///
/// Identity is `(name, version, platform)`: equality, hashing and ordering
/// ignore the dependency lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDescriptor {
    #[serde(deserialize_with = "path_component")]
    pub name: String,
    pub version: Version,
    #[serde(default, deserialize_with = "platform_component")]
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(
        default,
        deserialize_with = "path_components",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub executables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(
        default,
        rename = "dev-dependencies",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub dev_dependencies: Vec<Dependency>,
}

impl PackageDescriptor {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            platform: Platform::any(),
            summary: None,
            executables: Vec::new(),
            dependencies: Vec::new(),
            dev_dependencies: Vec::new(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<Platform>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies
            .push(dependency.with_kind(DependencyKind::Runtime));
        self
    }

    pub fn with_dev_dependency(mut self, dependency: Dependency) -> Self {
        self.dev_dependencies
            .push(dependency.with_kind(DependencyKind::Development));
        self
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executables.push(executable.into());
        self
    }

    /// `name-version`, suffixed with the platform unless portable
    pub fn full_name(&self) -> String {
        if self.platform.is_any() {
            format!("{}-{}", self.name, self.version)
        } else {
            format!("{}-{}-{}", self.name, self.version, self.platform)
        }
    }

    pub fn runtime_dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn development_dependencies(&self) -> &[Dependency] {
        &self.dev_dependencies
    }

    /// Parse a descriptor from TOML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        let descriptor: Self = toml::from_str(content)?;
        Ok(descriptor.normalized())
    }

    /// Load a descriptor from a package.toml file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&content)?)
    }

    /// Serialize to TOML
    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub(crate) fn normalized(mut self) -> Self {
        for dep in &mut self.dependencies {
            dep.kind = DependencyKind::Runtime;
        }
        for dep in &mut self.dev_dependencies {
            dep.kind = DependencyKind::Development;
        }
        self
    }
}

/// Names and executables end up as file names under the install directory
fn check_path_component(value: &str) -> Result<(), String> {
    if value.is_empty() || value == "." || value.contains("..") || value.contains(['/', '\\']) {
        return Err(format!("'{}' is not a valid file name", value));
    }
    Ok(())
}

fn path_component<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    check_path_component(&value).map_err(de::Error::custom)?;
    Ok(value)
}

fn path_components<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Vec::<String>::deserialize(deserializer)?;
    for value in &values {
        check_path_component(value).map_err(de::Error::custom)?;
    }
    Ok(values)
}

fn platform_component<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Platform, D::Error> {
    let platform = Platform::deserialize(deserializer)?;
    check_path_component(platform.as_str()).map_err(de::Error::custom)?;
    Ok(platform)
}

impl PartialEq for PackageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.platform == other.platform
    }
}

impl Eq for PackageDescriptor {}

impl Hash for PackageDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.platform.hash(state);
    }
}

impl Ord for PackageDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.platform.cmp(&other.platform))
    }
}

impl PartialOrd for PackageDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_descriptor() {
        let toml = r#"
            name = "widget"
            version = "1.2.0"
            executables = ["widget"]

            [[dependencies]]
            name = "gear"
            requirement = ">=1.0, <2.0"

            [[dev-dependencies]]
            name = "harness"
        "#;

        let descriptor = PackageDescriptor::from_str(toml).unwrap();
        assert_eq!(descriptor.full_name(), "widget-1.2.0");
        assert!(descriptor.platform.is_any());
        assert_eq!(descriptor.dependencies.len(), 1);
        assert_eq!(descriptor.dependencies[0].kind, DependencyKind::Runtime);
        assert!(descriptor.dev_dependencies[0].is_development());
        assert!(descriptor.dev_dependencies[0].requirement.is_any());
    }

    #[test]
    fn test_toml_roundtrip() {
        let descriptor = PackageDescriptor::new("widget", Version::new(0, 3, 1))
            .with_platform("x86_64-linux")
            .with_dependency(Dependency::parse("gear", "^1").unwrap())
            .with_dev_dependency(Dependency::any("harness"));

        let text = descriptor.to_string().unwrap();
        let parsed = PackageDescriptor::from_str(&text).unwrap();
        assert_eq!(parsed, descriptor);
        assert_eq!(parsed.dependencies, descriptor.dependencies);
        assert_eq!(parsed.dev_dependencies, descriptor.dev_dependencies);
    }

    #[test]
    fn test_full_name_includes_specific_platform() {
        let descriptor =
            PackageDescriptor::new("native", Version::new(2, 0, 0)).with_platform("aarch64-macos");
        assert_eq!(descriptor.full_name(), "native-2.0.0-aarch64-macos");
    }

    #[test]
    fn test_ordering_version_then_platform() {
        let old = PackageDescriptor::new("a", Version::new(1, 0, 0));
        let new = PackageDescriptor::new("a", Version::new(1, 2, 0));
        let native = new.clone().with_platform("x86_64-linux");

        assert!(old < new);
        assert!(new < native);
        assert_ne!(new, native);
    }

    #[rstest]
    #[case::parent_name("name = \"../../victim\"\nversion = \"1.0.0\"\n")]
    #[case::nested_name("name = \"a/b\"\nversion = \"1.0.0\"\n")]
    #[case::backslash_name("name = 'a\\b'\nversion = \"1.0.0\"\n")]
    #[case::executable("name = \"a\"\nversion = \"1.0.0\"\nexecutables = [\"../x\"]\n")]
    #[case::platform("name = \"a\"\nversion = \"1.0.0\"\nplatform = \"../../etc\"\n")]
    fn test_rejects_path_escapes(#[case] toml: &str) {
        let err = PackageDescriptor::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("is not a valid file name"), "{}", err);
    }

    #[test]
    fn test_platform_matching() {
        assert!(Platform::any().matches_current());
        assert!(Platform::current().matches_current());
        assert!(!Platform::from("sparc-solaris-9000").matches_current());
        assert_eq!(Platform::from(""), Platform::any());
    }
}
