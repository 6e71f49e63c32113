//! # Count Retrieval
//!
//! The numbers an NPMI score is made of, for a `(path, predicate)` pair:
//!
//! | Operation | Counts |
//! |-----------|--------|
//! | `count_path_instances` | distinct `(x, y)` connected by the path, x ∈ domain, y ∈ range |
//! | `count_cooccurrences` | pairs connected by the path AND directly by the property |
//! | `count_predicate_instances` | pairs connected directly by the property |
//! | `derive_max_count` | `|domain candidates| * |range candidates|` |
//!
//! ## Implementations
//!
//! | Retriever | Module | Description |
//! |-----------|--------|-------------|
//! | `InMemoryCountRetriever` | `memory` | Parallel set joins over a `GraphQuery` |
//! | `RemoteCountRetriever` | `remote` | Aggregate queries via a `PathClauseGenerator` |
//! | `CachingCountRetriever` | `cache` | Bounded memoizing decorator |
//! | `UnavailableCountRetriever` | here | Fails every call; for error-path tests |

pub mod memory;
pub mod remote;
pub mod clause;
pub mod cache;

use std::sync::Arc;

use crate::graph::QueryEndpoint;
use crate::model::*;
use crate::{Error, Result};

pub use cache::CachingCountRetriever;
pub use clause::{BgpPathClauseGenerator, PathClauseGenerator, PropertyPathClauseGenerator};
pub use memory::InMemoryCountRetriever;
pub use remote::RemoteCountRetriever;

// ============================================================================
// CountRetriever Trait
// ============================================================================

/// The counting contract consumed by scorers.
///
/// Every count is a `Result`: a query that could not be answered is an
/// error, never a 0. Implementations must be callable from many scoring
/// threads at once.
pub trait CountRetriever: Send + Sync {
    /// Distinct `(x, y)` pairs connected by `path`, with x admitted by
    /// `domain` and y admitted by `range` (`None` admits every entity).
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<u64>;

    /// Distinct pairs connected both by `path` and by the predicate's
    /// property, within the predicate's domain and range.
    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64>;

    /// Distinct pairs connected by the predicate's property, within its
    /// domain and range.
    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64>;

    /// `|candidate subjects| * |candidate objects|` under the predicate's
    /// domain and range.
    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64>;

    /// Path instances, co-occurrences and max count in one go.
    fn count_all(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<CountTriple> {
        Ok(CountTriple {
            occurrences: self.count_path_instances(
                path,
                predicate.domain.as_ref(),
                predicate.range.as_ref(),
            )?,
            cooccurrences: self.count_cooccurrences(predicate, path)?,
            max_count: self.derive_max_count(predicate)?,
        })
    }
}

impl<R: CountRetriever + ?Sized> CountRetriever for &R {
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<u64> {
        (**self).count_path_instances(path, domain, range)
    }

    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64> {
        (**self).count_cooccurrences(predicate, path)
    }

    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64> {
        (**self).count_predicate_instances(predicate)
    }

    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64> {
        (**self).derive_max_count(predicate)
    }
}

impl<R: CountRetriever + ?Sized> CountRetriever for Arc<R> {
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<u64> {
        (**self).count_path_instances(path, domain, range)
    }

    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64> {
        (**self).count_cooccurrences(predicate, path)
    }

    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64> {
        (**self).count_predicate_instances(predicate)
    }

    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64> {
        (**self).derive_max_count(predicate)
    }
}

// ============================================================================
// CountBackend: config-selected strategy
// ============================================================================

/// The two counting strategies behind one type, chosen by configuration.
///
/// Dispatch is a `match`, not a trait object, so the choice stays visible
/// in the type and both variants keep their concrete APIs.
pub enum CountBackend<G, E> {
    InMemory(InMemoryCountRetriever<G>),
    Remote(RemoteCountRetriever<E>),
}

impl<G, E> CountBackend<G, E>
where
    G: crate::graph::GraphQuery,
    E: QueryEndpoint,
{
    /// Build the strategy named in `strategy`. Only the resource that
    /// strategy needs has to be supplied.
    pub fn from_strategy(
        strategy: &crate::config::CountStrategy,
        graph: Option<G>,
        endpoint: Option<E>,
    ) -> Result<Self> {
        use crate::config::CountStrategy;

        match strategy {
            CountStrategy::InMemory => graph
                .map(|g| CountBackend::InMemory(InMemoryCountRetriever::new(g)))
                .ok_or_else(|| Error::Config("in-memory counting needs a graph".into())),
            CountStrategy::Remote { clause_style } => endpoint
                .map(|e| {
                    CountBackend::Remote(RemoteCountRetriever::with_generator(
                        e,
                        clause_style.generator(),
                    ))
                })
                .ok_or_else(|| Error::Config("remote counting needs a query endpoint".into())),
        }
    }
}

impl<G, E> CountRetriever for CountBackend<G, E>
where
    G: crate::graph::GraphQuery,
    E: QueryEndpoint,
{
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<u64> {
        match self {
            CountBackend::InMemory(r) => r.count_path_instances(path, domain, range),
            CountBackend::Remote(r) => r.count_path_instances(path, domain, range),
        }
    }

    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64> {
        match self {
            CountBackend::InMemory(r) => r.count_cooccurrences(predicate, path),
            CountBackend::Remote(r) => r.count_cooccurrences(predicate, path),
        }
    }

    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64> {
        match self {
            CountBackend::InMemory(r) => r.count_predicate_instances(predicate),
            CountBackend::Remote(r) => r.count_predicate_instances(predicate),
        }
    }

    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64> {
        match self {
            CountBackend::InMemory(r) => r.derive_max_count(predicate),
            CountBackend::Remote(r) => r.derive_max_count(predicate),
        }
    }
}

// ============================================================================
// UnavailableCountRetriever
// ============================================================================

/// A retriever whose store is always down.
#[derive(Debug, Clone, Default)]
pub struct UnavailableCountRetriever {
    reason: String,
}

impl UnavailableCountRetriever {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    fn fail(&self, what: String) -> Error {
        Error::query_failure(what, self.reason.clone())
    }
}

impl CountRetriever for UnavailableCountRetriever {
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        _domain: Option<&TypeRestriction>,
        _range: Option<&TypeRestriction>,
    ) -> Result<u64> {
        Err(self.fail(format!("path instances of {path}")))
    }

    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64> {
        Err(self.fail(format!("co-occurrences of {path} with <{}>", predicate.property)))
    }

    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64> {
        Err(self.fail(format!("instances of <{}>", predicate.property)))
    }

    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64> {
        Err(self.fail(format!("max count of <{}>", predicate.property)))
    }
}
