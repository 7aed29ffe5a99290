//! Version requirements and their conjunction

use semver::{BuildMetadata, Comparator, Op, Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A conjunction of semver comparators.
///
/// Comparators are kept sorted by their display form and de-duplicated, so two
/// requirements built from the same comparators in any order compare equal.
/// The empty conjunction matches every release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Requirement {
    req: VersionReq,
}

impl Requirement {
    /// Requirement that every release satisfies
    pub fn any() -> Self {
        Self::default()
    }

    /// Requirement pinned to exactly `version`
    pub fn exact(version: &Version) -> Self {
        Self::from_comparators(vec![Comparator {
            op: Op::Exact,
            major: version.major,
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        }])
    }

    /// Parse a requirement, treating `""` and `"*"` as [`Requirement::any`]
    pub fn parse(s: &str) -> Result<Self, semver::Error> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }

        let req = VersionReq::parse(trimmed)?;
        Ok(Self::from_comparators(req.comparators))
    }

    fn from_comparators(mut comparators: Vec<Comparator>) -> Self {
        comparators.sort_by_cached_key(|c| c.to_string());
        comparators.dedup();
        Self {
            req: VersionReq { comparators },
        }
    }

    pub fn is_any(&self) -> bool {
        self.req.comparators.is_empty()
    }

    pub fn comparators(&self) -> &[Comparator] {
        &self.req.comparators
    }

    /// Logical AND of two requirements
    pub fn merge(&self, other: &Requirement) -> Requirement {
        let mut comparators = self.req.comparators.clone();
        comparators.extend(other.req.comparators.iter().cloned());
        Self::from_comparators(comparators)
    }

    /// Check whether `version` satisfies every comparator.
    ///
    /// Prerelease versions follow semver's opt-in rule unless
    /// `allow_prerelease` is set, in which case they only need to fall inside
    /// the bounds of each comparator.
    pub fn matches(&self, version: &Version, allow_prerelease: bool) -> bool {
        if version.pre.is_empty() || !allow_prerelease {
            return self.req.matches(version);
        }

        let version = Version {
            build: BuildMetadata::EMPTY,
            ..version.clone()
        };
        self.req
            .comparators
            .iter()
            .all(|cmp| within_bounds(cmp, &version))
    }
}

/// Bounds check that ignores semver's prerelease opt-in rule
fn within_bounds(cmp: &Comparator, version: &Version) -> bool {
    let floor = Version {
        major: cmp.major,
        minor: cmp.minor.unwrap_or(0),
        patch: cmp.patch.unwrap_or(0),
        pre: cmp.pre.clone(),
        build: BuildMetadata::EMPTY,
    };
    let prefix_matches = version.major == cmp.major
        && cmp.minor.map_or(true, |minor| version.minor == minor)
        && cmp.patch.map_or(true, |patch| version.patch == patch);

    match cmp.op {
        Op::Exact if cmp.patch.is_some() => *version == floor,
        Op::Exact | Op::Wildcard => prefix_matches,
        Op::Greater => match (cmp.minor, cmp.patch) {
            (None, _) => version.major > cmp.major,
            (Some(minor), None) => (version.major, version.minor) > (cmp.major, minor),
            _ => *version > floor,
        },
        Op::GreaterEq => *version >= floor,
        Op::Less => match (cmp.minor, cmp.patch) {
            (None, _) => version.major < cmp.major,
            (Some(minor), None) => (version.major, version.minor) < (cmp.major, minor),
            _ => *version < floor,
        },
        Op::LessEq => match (cmp.minor, cmp.patch) {
            (None, _) => version.major <= cmp.major,
            (Some(minor), None) => (version.major, version.minor) <= (cmp.major, minor),
            _ => *version <= floor,
        },
        Op::Tilde => {
            *version >= floor
                && version.major == cmp.major
                && cmp.minor.map_or(true, |minor| version.minor == minor)
        }
        Op::Caret => {
            if *version < floor || version.major != cmp.major {
                return false;
            }
            if cmp.major > 0 {
                return true;
            }
            match (cmp.minor, cmp.patch) {
                (None, _) => true,
                (Some(minor), _) if minor > 0 => version.minor == minor,
                (Some(_), None) => version.minor == 0,
                (Some(_), Some(patch)) => version.minor == 0 && version.patch == patch,
            }
        }
        _ => cmp.matches(version),
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self.req.comparators.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}

impl FromStr for Requirement {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Requirement {
    type Error = semver::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Requirement> for String {
    fn from(value: Requirement) -> Self {
        value.to_string()
    }
}
