//! Candidate graph validation and install ordering

use crate::dependency::Dependency;
use crate::descriptor::PackageDescriptor;
use crate::registry::InstalledRegistry;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Unsatisfied requirements, grouped by the package that declares them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    pub entries: Vec<(String, Vec<Dependency>)>,
}

impl DependencyReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, package: &str, dependency: Dependency) {
        match self.entries.iter_mut().find(|(name, _)| name == package) {
            Some((_, missing)) => missing.push(dependency),
            None => self.entries.push((package.to_string(), vec![dependency])),
        }
    }
}

impl fmt::Display for DependencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (package, missing)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
            write!(f, "{} requires {}", package, missing.join(", "))?;
        }
        Ok(())
    }
}

/// The set of packages selected for installation
#[derive(Debug, Clone, Default)]
pub struct DependencyList {
    specs: Vec<PackageDescriptor>,
    development: bool,
}

impl DependencyList {
    /// `development` adds development dependencies to the ordering edges
    pub fn new(development: bool) -> Self {
        Self {
            specs: Vec::new(),
            development,
        }
    }

    /// Add a package; exact duplicates are ignored
    pub fn add(&mut self, descriptor: PackageDescriptor) {
        if !self.contains(&descriptor) {
            self.specs.push(descriptor);
        }
    }

    pub fn specs(&self) -> &[PackageDescriptor] {
        &self.specs
    }

    pub fn contains(&self, descriptor: &PackageDescriptor) -> bool {
        self.specs.contains(descriptor)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn remove_where(&mut self, mut predicate: impl FnMut(&PackageDescriptor) -> bool) {
        self.specs.retain(|spec| !predicate(spec));
    }

    /// Drop members whose version falls outside the merged constraint on
    /// their name. Members whose full name is in `keep` stay regardless.
    pub fn prune_unsatisfied(
        &mut self,
        merged: &BTreeMap<String, Dependency>,
        keep: &HashSet<String>,
    ) {
        self.specs.retain(|spec| {
            if keep.contains(&spec.full_name()) {
                return true;
            }
            match merged.get(&spec.name) {
                Some(constraint) if !constraint.matches_descriptor(spec) => {
                    debug!("Dropping {}: does not satisfy {}", spec, constraint);
                    false
                }
                _ => true,
            }
        });
    }

    /// Every runtime dependency of every member is met by a member or an
    /// installed package
    pub fn is_satisfiable(&self, installed: &dyn InstalledRegistry) -> bool {
        self.unsatisfied_report(installed).is_empty()
    }

    pub fn unsatisfied_report(&self, installed: &dyn InstalledRegistry) -> DependencyReport {
        let mut report = DependencyReport::default();

        for spec in &self.specs {
            for dependency in spec.runtime_dependencies() {
                let met = installed.satisfies(dependency)
                    || self.specs.iter().any(|s| dependency.matches_descriptor(s));
                if !met {
                    report.push(&spec.name, dependency.clone());
                }
            }
        }

        report
    }

    /// Members ordered so every package precedes the packages it depends on.
    ///
    /// Only the highest version of each name takes part. Ties are broken by
    /// name; a dependency cycle is broken at its alphabetically first member,
    /// never at a package that only depends on the cycle.
    pub fn topological_order(&self) -> Vec<PackageDescriptor> {
        let mut nodes: BTreeMap<&str, &PackageDescriptor> = BTreeMap::new();
        for spec in &self.specs {
            nodes
                .entry(spec.name.as_str())
                .and_modify(|current| {
                    if spec > *current {
                        *current = spec;
                    }
                })
                .or_insert(spec);
        }

        // package -> names of the members it depends on
        let graph: BTreeMap<&str, BTreeSet<&str>> = nodes
            .iter()
            .map(|(&name, spec)| {
                let deps = self
                    .edges(spec)
                    .map(|dep| dep.name.as_str())
                    .filter(|dep| *dep != name && nodes.contains_key(dep))
                    .collect();
                (name, deps)
            })
            .collect();

        // Kahn's algorithm, leaves first
        let mut in_degree: BTreeMap<&str, usize> =
            graph.iter().map(|(&name, deps)| (name, deps.len())).collect();
        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&name, _)| name)
            .collect();
        let mut order: Vec<&str> = Vec::with_capacity(graph.len());

        while order.len() < graph.len() {
            let next = match ready.pop_first() {
                Some(name) => name,
                None => {
                    let Some(stuck) = in_degree
                        .iter()
                        .filter(|(_, degree)| **degree > 0)
                        .map(|(&name, _)| name)
                        .find(|&name| on_cycle(&graph, &in_degree, name))
                    else {
                        break;
                    };
                    warn!("Dependency cycle involving {}; breaking it there", stuck);
                    stuck
                }
            };

            in_degree.insert(next, 0);
            order.push(next);

            for (&dependent, deps) in &graph {
                if deps.contains(next) {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        if *degree > 0 {
                            *degree -= 1;
                            if *degree == 0 {
                                ready.insert(dependent);
                            }
                        }
                    }
                }
            }
        }

        order
            .into_iter()
            .rev()
            .filter_map(|name| nodes.get(name).map(|spec| (*spec).clone()))
            .collect()
    }

    fn edges<'s>(&self, spec: &'s PackageDescriptor) -> impl Iterator<Item = &'s Dependency> {
        let dev: &[Dependency] = if self.development {
            spec.development_dependencies()
        } else {
            &[]
        };
        spec.runtime_dependencies().iter().chain(dev)
    }
}

/// Whether `start` can reach itself through packages not yet ordered
fn on_cycle(
    graph: &BTreeMap<&str, BTreeSet<&str>>,
    in_degree: &BTreeMap<&str, usize>,
    start: &str,
) -> bool {
    let pending = |name: &str| in_degree.get(name).is_some_and(|degree| *degree > 0);
    let mut visited = BTreeSet::new();
    let mut stack: Vec<&str> = graph.get(start).into_iter().flatten().copied().collect();

    while let Some(name) = stack.pop() {
        if !pending(name) {
            continue;
        }
        if name == start {
            return true;
        }
        if visited.insert(name) {
            stack.extend(graph.get(name).into_iter().flatten().copied());
        }
    }
    false
}
