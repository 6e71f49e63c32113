//! # Fact Verification Model
//!
//! Clean DTOs shared by counting, scoring and search.
//! These types cross every boundary: graph ↔ counting ↔ scoring ↔ persistence.
//!
//! Design rule: no graph handles, no caches, no query text here beyond the
//! restriction fragments a `TypeRestriction` knows how to write.
//! This module is pure data without I/O or state.

pub mod triple;
pub mod path;
pub mod predicate;

pub use triple::{iri, Iri, Term, Triple, RDF_TYPE};
pub use path::{Direction, PathElement, RestrictedPath, ScoredPath, MAX_PATH_LENGTH};
pub use predicate::{Predicate, TypeRestriction};

/// The counts an NPMI score is derived from.
///
/// `cooccurrences <= occurrences` holds for consistent backends but is not
/// enforced: a remote store may answer the two queries from different
/// snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CountTriple {
    /// Distinct `(x, y)` pairs connected by the path.
    pub occurrences: u64,
    /// Distinct pairs connected by both the path and the property.
    pub cooccurrences: u64,
    /// `|candidate subjects| * |candidate objects|`.
    pub max_count: u64,
}

impl CountTriple {
    pub fn new(occurrences: u64, cooccurrences: u64, max_count: u64) -> Self {
        Self { occurrences, cooccurrences, max_count }
    }
}
