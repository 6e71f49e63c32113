//! # Path Search
//!
//! Discovers the restricted paths that connect the subject and object of
//! an example fact. Collected over many examples of one property, these
//! paths are the candidates the scorer later evaluates.
//!
//! | Type | Module | Description |
//! |------|--------|-------------|
//! | `GraphPathSearcher` | `graph` | Meet-in-the-middle search over any `GraphQuery` |
//! | `SequentialPathCollector` | `collect` | Searches examples one after another |
//! | `ParallelPathCollector` | `collect` | Worker pool fed through a bounded queue |

pub mod graph;
pub mod collect;

use std::sync::Arc;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::Result;

pub use collect::{
    CollectedPaths, CollectionSummary, ParallelPathCollector, PathCollector, SequentialPathCollector,
};
pub use graph::GraphPathSearcher;

// ============================================================================
// PathSearcher Trait
// ============================================================================

/// Finds the paths connecting `subject` to `object`.
pub trait PathSearcher: Send + Sync {
    /// Every restricted path from `subject` to `object`, excluding the
    /// predicate's own property as a single forward hop.
    fn search(
        &self,
        subject: &str,
        predicate: &Predicate,
        object: &str,
    ) -> Result<HashSet<RestrictedPath>>;
}

impl<S: PathSearcher + ?Sized> PathSearcher for &S {
    fn search(&self, subject: &str, predicate: &Predicate, object: &str) -> Result<HashSet<RestrictedPath>> {
        (**self).search(subject, predicate, object)
    }
}

impl<S: PathSearcher + ?Sized> PathSearcher for Arc<S> {
    fn search(&self, subject: &str, predicate: &Predicate, object: &str) -> Result<HashSet<RestrictedPath>> {
        (**self).search(subject, predicate, object)
    }
}

// ============================================================================
// NamespaceFilter
// ============================================================================

/// Which edge labels a search may follow, by IRI prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceFilter {
    /// Only labels starting with one of the prefixes.
    Allow(Vec<String>),
    /// Every label except those starting with one of the prefixes.
    Block(Vec<String>),
}

impl NamespaceFilter {
    pub fn allow<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NamespaceFilter::Allow(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn block<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NamespaceFilter::Block(prefixes.into_iter().map(Into::into).collect())
    }

    /// A filter accepting every label.
    pub fn any() -> Self {
        NamespaceFilter::Block(Vec::new())
    }

    pub fn accepts(&self, property: &str) -> bool {
        match self {
            NamespaceFilter::Allow(prefixes) => prefixes.iter().any(|p| property.starts_with(p.as_str())),
            NamespaceFilter::Block(prefixes) => !prefixes.iter().any(|p| property.starts_with(p.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_filter() {
        let allow = NamespaceFilter::allow(["http://dbpedia.org/ontology/"]);
        assert!(allow.accepts("http://dbpedia.org/ontology/birthPlace"));
        assert!(!allow.accepts("http://dbpedia.org/property/birthPlace"));

        let block = NamespaceFilter::block(["http://dbpedia.org/property/"]);
        assert!(block.accepts("http://dbpedia.org/ontology/birthPlace"));
        assert!(!block.accepts("http://dbpedia.org/property/birthPlace"));

        assert!(NamespaceFilter::any().accepts("urn:anything"));
    }

    #[test]
    fn test_filter_json() {
        let filter: NamespaceFilter = serde_json::from_str(r#"{"allow": ["ex:"]}"#).unwrap();
        assert_eq!(filter, NamespaceFilter::allow(["ex:"]));
    }
}
