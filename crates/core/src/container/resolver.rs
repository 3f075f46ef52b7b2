//! Typed bean resolution
//!
//! Resolution is a pure function of closed-registry state: a candidate
//! query followed by the alternative disambiguation rule. Outcomes are
//! typed values internally; errors are raised only at the API boundary.
//! Results, including negative ones, are memoized per (type, qualifier-set)
//! once the registry is closed. Concurrent first-access races are settled
//! by redundant computation; duplicate cache writes are idempotent.

use crate::container::bean::Bean;
use crate::container::qualifier::Qualifier;
use crate::container::registry::BeanRegistry;
use crate::container::types::BeanType;
use crate::errors::ContainerError;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Outcome of a resolution query; exactly one of these holds
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Arc<Bean>),
    Unsatisfied,
    Ambiguous(Vec<Arc<Bean>>),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn is_unsatisfied(&self) -> bool {
        matches!(self, Resolution::Unsatisfied)
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Resolution::Ambiguous(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolutionKey {
    required: BeanType,
    qualifiers: BTreeSet<Qualifier>,
}

/// Render a request for error messages
fn describe_request(required: &BeanType, qualifiers: &BTreeSet<Qualifier>) -> String {
    let rendered: Vec<String> = qualifiers.iter().map(|q| q.to_string()).collect();
    format!("{} with [{}]", required, rendered.join(", "))
}

/// Implements the disambiguation algorithm over a closed registry
pub struct Resolver {
    registry: Arc<BeanRegistry>,
    /// Archive enablement positions for alternative classes, the fallback
    /// tie-break when priorities do not discriminate
    alternative_order: HashMap<String, usize>,
    cache: RwLock<HashMap<ResolutionKey, Resolution>>,
}

impl Resolver {
    pub fn new(registry: Arc<BeanRegistry>, alternative_order: HashMap<String, usize>) -> Self {
        Self {
            registry,
            alternative_order,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve to a typed outcome, memoizing the result.
    ///
    /// Fails only when the registry has not been closed yet; every query
    /// against a closed registry yields exactly one of the three outcomes.
    pub fn lookup(
        &self,
        required: &BeanType,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> Result<Resolution, ContainerError> {
        if !self.registry.is_closed() {
            return Err(ContainerError::illegal_state(
                "lookup",
                "registry is still open for discovery",
            ));
        }

        let key = ResolutionKey {
            required: required.clone(),
            qualifiers: qualifiers.clone(),
        };

        if let Ok(cache) = self.cache.read() {
            if let Some(outcome) = cache.get(&key) {
                return Ok(outcome.clone());
            }
        }

        let candidates = self.registry.resolve_candidates(required, qualifiers);
        let outcome = match candidates.as_slice() {
            [] => Resolution::Unsatisfied,
            [bean] => Resolution::Resolved(bean.clone()),
            _ => self.disambiguate(candidates),
        };
        trace!(
            request = %describe_request(required, qualifiers),
            resolved = outcome.is_resolved(),
            "resolution computed"
        );

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, outcome.clone());
        }
        Ok(outcome)
    }

    /// Resolve to the unique bean, surfacing negative outcomes as errors
    pub fn resolve(
        &self,
        required: &BeanType,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> Result<Arc<Bean>, ContainerError> {
        match self.lookup(required, qualifiers)? {
            Resolution::Resolved(bean) => Ok(bean),
            Resolution::Unsatisfied => Err(ContainerError::unsatisfied(describe_request(
                required, qualifiers,
            ))),
            Resolution::Ambiguous(candidates) => Err(ContainerError::ambiguous(
                describe_request(required, qualifiers),
                candidates
                    .iter()
                    .map(|b| b.bean_class().to_string())
                    .collect(),
            )),
        }
    }

    /// Alternative tie-break: priority wins; among equal priorities the
    /// earlier archive enablement position wins; otherwise ambiguous.
    fn disambiguate(&self, candidates: Vec<Arc<Bean>>) -> Resolution {
        let alternatives: Vec<Arc<Bean>> = candidates
            .iter()
            .filter(|b| b.attributes().is_alternative())
            .cloned()
            .collect();
        if alternatives.is_empty() {
            return Resolution::Ambiguous(candidates);
        }

        let max_priority = alternatives
            .iter()
            .filter_map(|b| b.attributes().priority())
            .max();
        let mut subset: Vec<Arc<Bean>> = match max_priority {
            Some(max) => alternatives
                .iter()
                .filter(|b| b.attributes().priority() == Some(max))
                .cloned()
                .collect(),
            None => alternatives,
        };
        if subset.len() == 1 {
            if let Some(winner) = subset.pop() {
                return Resolution::Resolved(winner);
            }
        }

        let mut ordered: Vec<(usize, Arc<Bean>)> = subset
            .iter()
            .filter_map(|b| {
                self.alternative_order
                    .get(b.bean_class())
                    .map(|&pos| (pos, b.clone()))
            })
            .collect();
        if ordered.len() == subset.len() {
            ordered.sort_by_key(|(pos, _)| *pos);
            if let Some((_, first)) = ordered.into_iter().next() {
                return Resolution::Resolved(first);
            }
        }

        Resolution::Ambiguous(candidates)
    }

    /// Drop every memoized outcome. Only legal before the registry would
    /// reopen, which does not happen post-boot; used at shutdown.
    pub fn cleanup(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    pub fn cached_resolutions(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cached_resolutions", &self.cached_resolutions())
            .finish()
    }
}
