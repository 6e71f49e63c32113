//! # Graph Query Capability
//!
//! This is THE contract between the counting engine and a knowledge graph.
//! Every lookup the joins and the path search need is defined here, scoped
//! to single-property edge lookups plus type restriction resolution.
//!
//! ## Implementations
//!
//! | Graph | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryGraph` | `memory` | Fully loaded, indexed in-memory graph |
//! | `RemoteGraph` | `remote` | SPARQL SELECT queries against a `QueryEndpoint` |

pub mod memory;
pub mod remote;

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::model::*;
use crate::Result;

pub use memory::MemoryGraph;
pub use remote::{QueryEndpoint, QuerySolution, RemoteGraph};

/// A set of entities.
pub type EntitySet = HashSet<Iri>;

/// A set of `(from, to)` entity pairs.
pub type PairSet = HashSet<(Iri, Iri)>;

/// `reached entity → anchors it was reached from`.
pub type Adjacency = HashMap<Iri, EntitySet>;

// ============================================================================
// GraphQuery Trait
// ============================================================================

/// The graph contract consumed by counting and search.
///
/// All methods take `&self`: a graph is read-only while it is being
/// counted over, and implementations must be shareable across the worker
/// threads of a join or a search.
pub trait GraphQuery: Send + Sync {
    /// Follow `property` in `direction` and return `(from, to)` pairs.
    ///
    /// With `anchors`, only pairs whose `from` is an anchor are returned.
    /// Only IRI endpoints are reported; literal objects never join.
    fn lookup(
        &self,
        property: &str,
        direction: Direction,
        anchors: Option<&EntitySet>,
    ) -> Result<PairSet>;

    /// All entities admitted by the restriction.
    ///
    /// `None` resolves to every entity of the graph: every subject, plus
    /// every IRI object of an edge other than `rdf:type`. A class that only
    /// appears as the object of `rdf:type` is not an entity.
    fn resolve_restriction(&self, restriction: Option<&TypeRestriction>) -> Result<EntitySet>;

    /// Every edge touching `entity`, as the element that leaves it plus the
    /// entity on the other end. `Forward` elements are outgoing edges,
    /// `Inverse` elements are incoming ones.
    fn neighbours(&self, entity: &str) -> Result<Vec<(PathElement, Iri)>>;

    /// Follow `property` in `direction` from `anchors`, grouped by the
    /// entity reached.
    ///
    /// Default: group the pairs of `lookup`.
    fn reach(
        &self,
        property: &str,
        direction: Direction,
        anchors: &EntitySet,
    ) -> Result<Adjacency> {
        let mut adjacency = Adjacency::new();
        for (from, to) in self.lookup(property, direction, Some(anchors))? {
            adjacency.entry(to).or_default().insert(from);
        }
        Ok(adjacency)
    }

    /// Direct `(subject, object)` instances of the predicate's property,
    /// restricted to its domain and range.
    fn predicate_pairs(&self, predicate: &Predicate) -> Result<PairSet> {
        let subjects = predicate
            .domain
            .as_ref()
            .map(|domain| self.resolve_restriction(Some(domain)))
            .transpose()?;
        let objects = predicate
            .range
            .as_ref()
            .map(|range| self.resolve_restriction(Some(range)))
            .transpose()?;

        let mut pairs = self.lookup(&predicate.property, Direction::Forward, subjects.as_ref())?;
        if let Some(objects) = &objects {
            pairs.retain(|(_, o)| objects.contains(o));
        }
        Ok(pairs)
    }
}

impl<G: GraphQuery + ?Sized> GraphQuery for &G {
    fn lookup(&self, property: &str, direction: Direction, anchors: Option<&EntitySet>) -> Result<PairSet> {
        (**self).lookup(property, direction, anchors)
    }

    fn resolve_restriction(&self, restriction: Option<&TypeRestriction>) -> Result<EntitySet> {
        (**self).resolve_restriction(restriction)
    }

    fn neighbours(&self, entity: &str) -> Result<Vec<(PathElement, Iri)>> {
        (**self).neighbours(entity)
    }

    fn reach(&self, property: &str, direction: Direction, anchors: &EntitySet) -> Result<Adjacency> {
        (**self).reach(property, direction, anchors)
    }

    fn predicate_pairs(&self, predicate: &Predicate) -> Result<PairSet> {
        (**self).predicate_pairs(predicate)
    }
}

impl<G: GraphQuery + ?Sized> GraphQuery for Arc<G> {
    fn lookup(&self, property: &str, direction: Direction, anchors: Option<&EntitySet>) -> Result<PairSet> {
        (**self).lookup(property, direction, anchors)
    }

    fn resolve_restriction(&self, restriction: Option<&TypeRestriction>) -> Result<EntitySet> {
        (**self).resolve_restriction(restriction)
    }

    fn neighbours(&self, entity: &str) -> Result<Vec<(PathElement, Iri)>> {
        (**self).neighbours(entity)
    }

    fn reach(&self, property: &str, direction: Direction, anchors: &EntitySet) -> Result<Adjacency> {
        (**self).reach(property, direction, anchors)
    }

    fn predicate_pairs(&self, predicate: &Predicate) -> Result<PairSet> {
        (**self).predicate_pairs(predicate)
    }
}
