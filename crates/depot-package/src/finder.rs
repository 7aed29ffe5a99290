//! Candidate discovery across local and remote sources

use crate::config::Domain;
use crate::dependency::Dependency;
use crate::source::{Candidate, FetchError, LocalRepository, RemoteCatalog, Source};
use std::rc::Rc;
use tracing::{debug, warn};

/// Per-call discovery context.
///
/// Holds the effective domain, which drops to local-only for the rest of
/// the call once a remote catalog fails at the transport level, and the
/// non-fatal errors collected along the way.
pub struct CandidateFinder<'a> {
    local: &'a dyn LocalRepository,
    remotes: &'a [Rc<dyn RemoteCatalog>],
    domain: Domain,
    errors: Vec<FetchError>,
}

impl<'a> CandidateFinder<'a> {
    pub fn new(
        local: &'a dyn LocalRepository,
        remotes: &'a [Rc<dyn RemoteCatalog>],
        domain: Domain,
    ) -> Self {
        Self {
            local,
            remotes,
            domain,
            errors: Vec::new(),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn consider_local(&self) -> bool {
        self.domain.consider_local()
    }

    pub fn consider_remote(&self) -> bool {
        self.domain.consider_remote()
    }

    pub fn local(&self) -> &'a dyn LocalRepository {
        self.local
    }

    pub fn errors(&self) -> &[FetchError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<FetchError> {
        std::mem::take(&mut self.errors)
    }

    /// Candidates for `dependency`, local first, then newest first.
    ///
    /// The local directory contributes only its newest package of that name,
    /// and only if it satisfies the constraint.
    pub fn find_candidates(&mut self, dependency: &Dependency) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        if self.consider_local() {
            if let Some(package) = self.local.newest(&dependency.name) {
                if dependency.matches_descriptor(&package.descriptor) {
                    candidates.push(package.clone().into_candidate());
                }
            }
        }

        if self.consider_remote() {
            for catalog in self.remotes {
                match catalog.query(dependency) {
                    Ok(query) => {
                        self.errors.extend(query.errors);
                        candidates.extend(query.found.into_iter().map(|descriptor| {
                            Candidate::new(descriptor, Source::Remote(Rc::clone(catalog)))
                        }));
                    }
                    Err(e) => {
                        warn!(
                            "Error fetching remote data from {}: {}. Falling back to local-only install",
                            catalog.uri(),
                            e
                        );
                        self.errors.push(e);
                        self.domain = Domain::Local;
                        break;
                    }
                }
            }
        }

        candidates.sort_by(Candidate::preference);
        debug!("{} candidate(s) for {}", candidates.len(), dependency);
        candidates
    }
}
