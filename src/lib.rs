//! # copaal-rs: Path-Based Fact Verification over Knowledge Graphs
//!
//! Given a candidate fact `(subject, property, object)`, short *restricted
//! paths* in a knowledge graph are used as evidence: how strongly does
//! "x reaches y via this path" predict "x property y"? This crate is the
//! counting and scoring engine behind that question.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphQuery` is the contract between counting and the graph,
//!    `CountRetriever` is the contract between scoring and counting
//! 2. **Clean DTOs**: `RestrictedPath`, `Predicate`, `TypeRestriction` cross all boundaries
//! 3. **Scores live beside paths**: a `RestrictedPath` is a value key; `ScoredPath`
//!    carries the annotation, so deduplication never depends on a score
//! 4. **Errors are values**: a failed query is `Error::QueryFailure`, never a silent 0
//!
//! ## Quick Start
//!
//! ```rust
//! use copaal_rs::{
//!     Direction, MemoryGraph, NpmiScorer, PathScorer, Predicate, RestrictedPath,
//!     TypeRestriction, count::InMemoryCountRetriever,
//! };
//!
//! # fn example() -> copaal_rs::Result<()> {
//! let graph = MemoryGraph::new();
//! graph.insert_iri("ex:A", "ex:livesIn", "ex:C");
//! graph.insert_iri("ex:C", "ex:locatedIn", "ex:D");
//! graph.insert_iri("ex:A", "ex:nationality", "ex:D");
//!
//! let retriever = InMemoryCountRetriever::new(graph);
//! let scorer = NpmiScorer::new(retriever);
//!
//! let predicate = Predicate::new("ex:nationality")
//!     .with_domain(TypeRestriction::entities(["ex:A"]))
//!     .with_range(TypeRestriction::entities(["ex:D"]));
//! let path = RestrictedPath::new([
//!     ("ex:livesIn", Direction::Forward),
//!     ("ex:locatedIn", Direction::Forward),
//! ])?;
//!
//! let scored = scorer.score(&predicate, &path)?;
//! println!("{} -> {}", scored.path, scored.score);
//! # Ok(())
//! # }
//! ```
//!
//! ## Counting Backends
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | In-memory | `count::memory` | Parallel set joins over any `GraphQuery` |
//! | Remote | `count::remote` | SPARQL count/ask queries against a `QueryEndpoint` |
//! | Caching | `count::cache` | Bounded LRU decorator over either of the above |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod graph;
pub mod count;
pub mod score;
pub mod search;
pub mod catalog;
pub mod histogram;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    iri, Iri, Term, Triple,
    Direction, PathElement, RestrictedPath, ScoredPath, MAX_PATH_LENGTH,
    Predicate, TypeRestriction, CountTriple, RDF_TYPE,
};

// ============================================================================
// Re-exports: Graph capability
// ============================================================================

pub use graph::{
    GraphQuery, EntitySet, PairSet, Adjacency,
    memory::MemoryGraph,
    remote::{QueryEndpoint, QuerySolution, RemoteGraph},
};

// ============================================================================
// Re-exports: Counting & scoring
// ============================================================================

pub use count::{CountRetriever, CountBackend};
pub use count::cache::CachingCountRetriever;
pub use score::{PathScorer, ScoreSummary};
pub use score::npmi::NpmiScorer;
pub use score::batch::{PropertyScorer, PropertyScores, ScoreReuse, ReuseHistograms};

// ============================================================================
// Re-exports: Search
// ============================================================================

pub use search::{PathSearcher, NamespaceFilter};
pub use search::graph::GraphPathSearcher;
pub use search::collect::{
    PathCollector, SequentialPathCollector, ParallelPathCollector,
    CollectedPaths, CollectionSummary,
};
pub use catalog::{PredicateFactory, PredicateCatalog};
pub use histogram::Histogram;
pub use config::{ScoringConfig, SearchConfig, CountCacheConfig, CountStrategy, ClauseStyle};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid path length {0}: restricted paths have 1 to 3 elements")]
    InvalidPathLength(usize),

    #[error("Query failure: {message} (query: {query})")]
    QueryFailure { query: String, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `QueryFailure` for the given query text.
    pub fn query_failure(query: impl Into<String>, message: impl Into<String>) -> Self {
        Error::QueryFailure { query: query.into(), message: message.into() }
    }

    /// True for failures that leave a count unknown rather than wrong.
    /// Callers mark the affected path for rescoring.
    pub fn is_query_failure(&self) -> bool {
        matches!(self, Error::QueryFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
