//! Dependency declarations and constraint merging

use crate::descriptor::PackageDescriptor;
use crate::version::Requirement;
use crate::{PackageError, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a dependency is needed at runtime or only for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Runtime,
    Development,
}

/// A named version constraint on another package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub requirement: Requirement,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prerelease: bool,
    /// Set from the descriptor list the dependency was declared in
    #[serde(skip)]
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn new(name: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            name: name.into(),
            requirement,
            prerelease: false,
            kind: DependencyKind::Runtime,
        }
    }

    /// Dependency on any version of `name`
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, Requirement::any())
    }

    /// Parse the requirement from a string
    pub fn parse(name: impl Into<String>, requirement: &str) -> Result<Self> {
        Ok(Self::new(name, Requirement::parse(requirement)?))
    }

    pub fn with_prerelease(mut self, prerelease: bool) -> Self {
        self.prerelease = prerelease;
        self
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_development(&self) -> bool {
        self.kind == DependencyKind::Development
    }

    pub fn matches_version(&self, version: &Version) -> bool {
        self.requirement.matches(version, self.prerelease)
    }

    /// Name and version check against a concrete package
    pub fn matches_descriptor(&self, descriptor: &PackageDescriptor) -> bool {
        self.name == descriptor.name && self.matches_version(&descriptor.version)
    }

    /// Combine two constraints on the same package.
    ///
    /// Requirements are ANDed, prerelease opt-in is ORed, and the result is a
    /// development dependency only when both sides are.
    pub fn merge(&self, other: &Dependency) -> Result<Dependency> {
        if self.name != other.name {
            return Err(PackageError::InvalidField {
                field: "name".to_string(),
                reason: format!("cannot merge '{}' with '{}'", self.name, other.name),
            });
        }

        let kind = if self.is_development() && other.is_development() {
            DependencyKind::Development
        } else {
            DependencyKind::Runtime
        };

        Ok(Dependency {
            name: self.name.clone(),
            requirement: self.requirement.merge(&other.requirement),
            prerelease: self.prerelease || other.prerelease,
            kind,
        })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.requirement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dep(name: &str, req: &str) -> Dependency {
        Dependency::parse(name, req).unwrap()
    }

    #[test]
    fn test_display() {
        assert_eq!(dep("rake", ">=1.0").to_string(), "rake (>=1.0)");
        assert_eq!(Dependency::any("rake").to_string(), "rake (*)");
    }

    #[test]
    fn test_merge_rejects_different_names() {
        assert!(dep("a", "*").merge(&dep("b", "*")).is_err());
    }

    #[test]
    fn test_merge_flags() {
        let runtime = dep("a", ">=1.0");
        let dev = dep("a", "<3.0")
            .with_kind(DependencyKind::Development)
            .with_prerelease(true);

        let merged = runtime.merge(&dev).unwrap();
        assert!(merged.prerelease);
        assert_eq!(merged.kind, DependencyKind::Runtime);
        assert!(merged.matches_version(&Version::new(2, 0, 0)));
        assert!(!merged.matches_version(&Version::new(3, 0, 0)));
    }

    #[test]
    fn test_matches_descriptor() {
        let d = dep("b", "^1.0");
        assert!(d.matches_descriptor(&PackageDescriptor::new("b", Version::new(1, 2, 0))));
        assert!(!d.matches_descriptor(&PackageDescriptor::new("c", Version::new(1, 2, 0))));
        assert!(!d.matches_descriptor(&PackageDescriptor::new("b", Version::new(2, 0, 0))));
    }

    fn dependency_strategy() -> impl Strategy<Value = Dependency> {
        let op = prop_oneof![Just(">="), Just("<"), Just("~")];
        (op, 0u64..3, 0u64..3, any::<bool>(), any::<bool>()).prop_map(
            |(op, major, minor, pre, dev)| {
                let kind = if dev {
                    DependencyKind::Development
                } else {
                    DependencyKind::Runtime
                };
                dep("pkg", &format!("{}{}.{}", op, major, minor))
                    .with_prerelease(pre)
                    .with_kind(kind)
            },
        )
    }

    proptest! {
        #[test]
        fn merge_commutes(a in dependency_strategy(), b in dependency_strategy()) {
            prop_assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
        }

        #[test]
        fn merge_associates(
            a in dependency_strategy(),
            b in dependency_strategy(),
            c in dependency_strategy(),
        ) {
            let left = a.merge(&b).unwrap().merge(&c).unwrap();
            let right = a.merge(&b.merge(&c).unwrap()).unwrap();
            prop_assert_eq!(left, right);
        }
    }
}
