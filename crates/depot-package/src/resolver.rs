//! Transitive dependency graph construction
//!
//! Expansion is breadth-first from the requested roots. Each package name is
//! expanded once, and the version expanded is the only version of that name
//! that can be installed. Constraints on a name from every requester are
//! merged and applied once the queue drains.

use crate::config::InstallerOptions;
use crate::dependency::Dependency;
use crate::dependency_list::DependencyList;
use crate::descriptor::PackageDescriptor;
use crate::finder::CandidateFinder;
use crate::registry::InstalledRegistry;
use crate::source::Candidate;
use crate::{PackageError, Result};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Options that change how the graph is expanded and validated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveFlags {
    pub development: bool,
    pub dev_shallow: bool,
    pub minimal_deps: bool,
    pub ignore_dependencies: bool,
    pub force: bool,
}

impl ResolveFlags {
    /// Whether development dependencies count for a package
    pub fn includes_development(&self, is_root: bool) -> bool {
        self.development && (!self.dev_shallow || is_root)
    }

    fn validates(&self) -> bool {
        !(self.ignore_dependencies || self.force)
    }
}

impl From<&InstallerOptions> for ResolveFlags {
    fn from(options: &InstallerOptions) -> Self {
        Self {
            development: options.development,
            dev_shallow: options.dev_shallow,
            minimal_deps: options.minimal_deps,
            ignore_dependencies: options.ignore_dependencies,
            force: options.force,
        }
    }
}

/// One entry of the install order
#[derive(Debug, Clone)]
pub struct PlannedInstall {
    pub candidate: Candidate,
    /// Explicitly requested; always installed, even over an identical copy
    pub is_root: bool,
}

impl PlannedInstall {
    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.candidate.descriptor
    }
}

/// Packages to install, dependencies before their dependents
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub plan: Vec<PlannedInstall>,
}

impl Resolution {
    pub fn descriptors(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.plan.iter().map(PlannedInstall::descriptor)
    }

    pub fn len(&self) -> usize {
        self.plan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Bookkeeping for one expansion
#[derive(Debug, Default)]
struct ResolutionState {
    /// Full names of the roots
    keep: HashSet<String>,
    /// Names already expanded, with the version that was expanded
    seen: HashMap<String, PackageDescriptor>,
    /// Merged constraint per name
    constraints: BTreeMap<String, Dependency>,
    /// Source each selected descriptor was first found in
    sources: HashMap<PackageDescriptor, Candidate>,
}

impl ResolutionState {
    fn new(roots: &[Candidate]) -> Self {
        let mut state = Self {
            keep: roots.iter().map(|c| c.descriptor.full_name()).collect(),
            ..Self::default()
        };
        for root in roots {
            state.record(root.clone());
        }
        state
    }

    fn is_root(&self, descriptor: &PackageDescriptor) -> bool {
        self.keep.contains(&descriptor.full_name())
    }

    /// Accumulated constraint on `name`, starting out unconstrained
    fn constraint_for(&mut self, name: &str) -> &mut Dependency {
        self.constraints
            .entry(name.to_string())
            .or_insert_with(|| Dependency::any(name))
    }

    fn merge_constraint(&mut self, dependency: &Dependency) -> Result<()> {
        let constraint = self.constraint_for(&dependency.name);
        *constraint = constraint.merge(dependency)?;
        Ok(())
    }

    /// The version expanded for the descriptor's name is the one installed
    fn is_selected(&self, descriptor: &PackageDescriptor) -> bool {
        self.is_root(descriptor) || self.seen.get(&descriptor.name) == Some(descriptor)
    }

    fn record(&mut self, candidate: Candidate) {
        self.sources
            .entry(candidate.descriptor.clone())
            .or_insert(candidate);
    }
}

/// Expands root candidates into a validated, ordered install plan
pub struct GraphBuilder<'a, 'f> {
    finder: &'f mut CandidateFinder<'a>,
    installed: &'f dyn InstalledRegistry,
    flags: ResolveFlags,
}

impl<'a, 'f> GraphBuilder<'a, 'f> {
    pub fn new(
        finder: &'f mut CandidateFinder<'a>,
        installed: &'f dyn InstalledRegistry,
        flags: ResolveFlags,
    ) -> Self {
        Self {
            finder,
            installed,
            flags,
        }
    }

    pub fn expand(self, roots: Vec<Candidate>) -> Result<Resolution> {
        let mut state = ResolutionState::new(&roots);
        let mut list = DependencyList::new(self.flags.development);
        for root in &roots {
            list.add(root.descriptor.clone());
        }

        let mut builder = self;
        if !builder.flags.ignore_dependencies {
            let queue = roots.iter().map(|c| c.descriptor.clone()).collect();
            builder.add_found_dependencies(queue, &mut state, &mut list)?;
        }

        let installed = builder.installed;
        let root_names: HashSet<&str> = roots.iter().map(|c| c.descriptor.name.as_str()).collect();
        list.remove_where(|spec| {
            !state.is_root(spec)
                && (installed.contains(spec) || root_names.contains(spec.name.as_str()))
        });

        if builder.flags.validates() {
            let report = list.unsatisfied_report(installed);
            if !report.is_empty() {
                return Err(PackageError::Unresolvable(report));
            }
        }

        let mut order = list.topological_order();
        order.reverse();

        let plan = order
            .into_iter()
            .filter_map(|descriptor| {
                let is_root = state.is_root(&descriptor);
                // every list member was recorded together with its source
                state
                    .sources
                    .remove(&descriptor)
                    .map(|candidate| PlannedInstall { candidate, is_root })
            })
            .collect::<Vec<_>>();

        debug!(
            "Install order: {}",
            plan.iter()
                .map(|p| p.descriptor().full_name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Resolution { plan })
    }

    fn add_found_dependencies(
        &mut self,
        mut queue: VecDeque<PackageDescriptor>,
        state: &mut ResolutionState,
        list: &mut DependencyList,
    ) -> Result<()> {
        while let Some(spec) = queue.pop_front() {
            if state.seen.contains_key(&spec.name) {
                continue;
            }
            state.seen.insert(spec.name.clone(), spec.clone());

            let mut dependencies = spec.runtime_dependencies().to_vec();
            if self.flags.includes_development(state.is_root(&spec)) {
                dependencies.extend_from_slice(spec.development_dependencies());
            }

            for dependency in &dependencies {
                state.merge_constraint(dependency)?;

                if self.flags.minimal_deps && self.installed.satisfies(dependency) {
                    debug!("{} already satisfied, not looking it up", dependency);
                    continue;
                }

                let candidates = self.finder.find_candidates(dependency);
                let satisfied = self.installed.satisfies(dependency);

                for candidate in candidates {
                    // expanded even when installed: its own dependencies may
                    // need something newer than what is installed
                    queue.push_back(candidate.descriptor.clone());

                    if !satisfied {
                        list.add(candidate.descriptor.clone());
                        state.record(candidate);
                    }
                }
            }
        }

        list.prune_unsatisfied(&state.constraints, &state.keep);
        list.remove_where(|spec| {
            let unselected = !state.is_selected(spec);
            if unselected {
                debug!("Dropping {}: another version of {} was expanded", spec, spec.name);
            }
            unselected
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Domain;
    use crate::registry::InstalledPackages;
    use crate::source::{LocalPackage, LocalRepository, RemoteCatalog, Source};
    use pretty_assertions::assert_eq;
    use semver::Version;
    use std::path::PathBuf;
    use std::rc::Rc;

    struct Packages(Vec<LocalPackage>);

    impl LocalRepository for Packages {
        fn packages(&self) -> &[LocalPackage] {
            &self.0
        }
    }

    fn pkg(name: &str, version: &str) -> PackageDescriptor {
        PackageDescriptor::new(name, Version::parse(version).unwrap())
    }

    fn dep(name: &str, req: &str) -> Dependency {
        Dependency::parse(name, req).unwrap()
    }

    fn repo(descriptors: Vec<PackageDescriptor>) -> Packages {
        Packages(
            descriptors
                .into_iter()
                .map(|descriptor| LocalPackage {
                    path: PathBuf::from(format!("{}.pkg", descriptor.full_name())),
                    descriptor,
                })
                .collect(),
        )
    }

    fn root(descriptor: PackageDescriptor) -> Candidate {
        let path = PathBuf::from(format!("{}.pkg", descriptor.full_name()));
        Candidate::new(descriptor, Source::Local(path))
    }

    fn resolve(
        local: &Packages,
        installed: &InstalledPackages,
        flags: ResolveFlags,
        roots: Vec<PackageDescriptor>,
    ) -> Result<Vec<(String, bool)>> {
        let remotes: Vec<Rc<dyn RemoteCatalog>> = Vec::new();
        let mut finder = CandidateFinder::new(local, &remotes, Domain::Local);
        let resolution = GraphBuilder::new(&mut finder, installed, flags)
            .expand(roots.into_iter().map(root).collect())?;
        Ok(resolution
            .plan
            .iter()
            .map(|p| (p.descriptor().full_name(), p.is_root))
            .collect())
    }

    #[test]
    fn test_leaves_first() {
        let a = pkg("a", "1.0.0").with_dependency(dep("b", ">=1.0"));
        let local = repo(vec![
            pkg("b", "1.2.0").with_dependency(dep("c", "~0.3")),
            pkg("c", "0.3.4"),
        ]);

        let plan = resolve(&local, &InstalledPackages::new(), ResolveFlags::default(), vec![a])
            .unwrap();
        assert_eq!(
            plan,
            vec![
                ("c-0.3.4".to_string(), false),
                ("b-1.2.0".to_string(), false),
                ("a-1.0.0".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_installed_transitive_dependency_left_out() {
        let a = pkg("a", "1.0.0").with_dependency(dep("b", ">=1.0"));
        let local = repo(vec![pkg("b", "1.2.0")]);
        let installed = InstalledPackages::from_descriptors([pkg("b", "1.1.0")]);

        let plan = resolve(&local, &installed, ResolveFlags::default(), vec![a]).unwrap();
        assert_eq!(plan, vec![("a-1.0.0".to_string(), true)]);
    }

    #[test]
    fn test_installed_root_is_kept() {
        let a = pkg("a", "1.0.0");
        let installed = InstalledPackages::from_descriptors([a.clone()]);

        let plan = resolve(&repo(vec![]), &installed, ResolveFlags::default(), vec![a]).unwrap();
        assert_eq!(plan, vec![("a-1.0.0".to_string(), true)]);
    }

    #[test]
    fn test_merged_constraints_prune_candidates() {
        // a wants b <2, c wants b >=1.5; only b 1.9 is in range of both
        let a = pkg("a", "1.0.0")
            .with_dependency(dep("b", "<2"))
            .with_dependency(dep("c", "*"));
        let local = repo(vec![
            pkg("b", "1.9.0"),
            pkg("c", "1.0.0").with_dependency(dep("b", ">=1.5")),
        ]);

        let plan = resolve(&local, &InstalledPackages::new(), ResolveFlags::default(), vec![a])
            .unwrap();
        let names: Vec<&str> = plan.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b-1.9.0", "c-1.0.0", "a-1.0.0"]);
    }

    #[test]
    fn test_unresolvable_graph() {
        let a = pkg("a", "1.0.0").with_dependency(dep("d", ">=1.0"));
        let err = resolve(&repo(vec![]), &InstalledPackages::new(), ResolveFlags::default(), vec![a])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resolve dependencies: a requires d (>=1.0)"
        );
    }

    #[test]
    fn test_force_skips_validation() {
        let a = pkg("a", "1.0.0").with_dependency(dep("d", ">=1.0"));
        let flags = ResolveFlags {
            force: true,
            ..Default::default()
        };
        let plan = resolve(&repo(vec![]), &InstalledPackages::new(), flags, vec![a]).unwrap();
        assert_eq!(plan, vec![("a-1.0.0".to_string(), true)]);
    }

    #[test]
    fn test_dev_shallow_only_for_roots() {
        let a = pkg("a", "1.0.0")
            .with_dependency(dep("b", "*"))
            .with_dev_dependency(dep("t", "*"));
        let local = repo(vec![
            pkg("b", "1.0.0").with_dev_dependency(dep("u", "*")),
            pkg("t", "1.0.0"),
            pkg("u", "1.0.0"),
        ]);
        let flags = ResolveFlags {
            development: true,
            dev_shallow: true,
            ..Default::default()
        };

        let plan = resolve(&local, &InstalledPackages::new(), flags, vec![a]).unwrap();
        let names: Vec<&str> = plan.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"t-1.0.0"));
        assert!(!names.contains(&"u-1.0.0"));
        assert_eq!(names.last(), Some(&"a-1.0.0"));
    }

    #[test]
    fn test_dev_shallow_needs_development() {
        let shallow_only = InstallerOptions {
            dev_shallow: true,
            ..Default::default()
        };
        assert!(!ResolveFlags::from(&shallow_only).includes_development(true));

        let both = InstallerOptions {
            development: true,
            dev_shallow: true,
            ..Default::default()
        };
        let flags = ResolveFlags::from(&both);
        assert!(flags.includes_development(true));
        assert!(!flags.includes_development(false));
    }

    #[test]
    fn test_constraint_for_starts_unconstrained() {
        let mut state = ResolutionState::default();
        assert!(state.constraint_for("gear").requirement.is_any());

        state.merge_constraint(&dep("gear", ">=1.0")).unwrap();
        state.merge_constraint(&dep("gear", "<2")).unwrap();
        let merged = state.constraint_for("gear");
        assert!(merged.matches_version(&Version::new(1, 5, 0)));
        assert!(!merged.matches_version(&Version::new(2, 0, 0)));
    }
}
