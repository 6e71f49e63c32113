//! Configuration for counting, scoring and path search.
//!
//! Every struct deserializes with all fields optional; missing fields take
//! the `Default` value. Load with `ScoringConfig::from_json_str` or
//! `ScoringConfig::from_json_file`, both of which validate.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::count::clause::{BgpPathClauseGenerator, PathClauseGenerator, PropertyPathClauseGenerator};
use crate::model::MAX_PATH_LENGTH;
use crate::search::NamespaceFilter;
use crate::{Error, Result};

/// Namespace followed by default during path search.
pub const DEFAULT_NAMESPACE: &str = "http://dbpedia.org/ontology/";

// ============================================================================
// Counting
// ============================================================================

/// Where counts are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CountStrategy {
    /// Joins over a locally loaded graph.
    #[default]
    InMemory,
    /// Aggregate queries against a query endpoint.
    Remote {
        #[serde(default)]
        clause_style: ClauseStyle,
    },
}

/// How a remote query spells out a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseStyle {
    /// One triple pattern per hop.
    #[default]
    Bgp,
    /// One SPARQL 1.1 sequence path.
    PropertyPath,
}

impl ClauseStyle {
    pub fn generator(self) -> Box<dyn PathClauseGenerator> {
        match self {
            ClauseStyle::Bgp => Box::new(BgpPathClauseGenerator),
            ClauseStyle::PropertyPath => Box::new(PropertyPathClauseGenerator),
        }
    }
}

/// Capacities of the four count caches. 0 disables a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountCacheConfig {
    pub path_instances: u64,
    pub cooccurrences: u64,
    pub predicate_instances: u64,
    pub max_counts: u64,
}

impl Default for CountCacheConfig {
    fn default() -> Self {
        Self {
            path_instances: 2,
            cooccurrences: 20,
            predicate_instances: 5,
            max_counts: 20,
        }
    }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Longest path searched for, 1 to 3.
    pub max_path_length: usize,
    /// Edge labels the search may follow.
    pub namespaces: NamespaceFilter,
    /// Example triples searched per property; `None` searches all.
    pub max_triples_per_property: Option<usize>,
    /// Collector workers; `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
    /// Example triples that may wait for a worker.
    pub queue_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_path_length: MAX_PATH_LENGTH,
            namespaces: NamespaceFilter::allow([DEFAULT_NAMESPACE]),
            max_triples_per_property: None,
            worker_threads: None,
            queue_capacity: 1024,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PATH_LENGTH).contains(&self.max_path_length) {
            return Err(Error::Config(format!(
                "max_path_length must be between 1 and {MAX_PATH_LENGTH}, got {}",
                self.max_path_length
            )));
        }
        if self.worker_threads == Some(0) {
            return Err(Error::Config("worker_threads must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Worker count after resolving `None`.
    pub fn workers(&self) -> usize {
        resolve_workers(self.worker_threads)
    }
}

// ============================================================================
// Scoring
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub strategy: CountStrategy,
    pub cache: CountCacheConfig,
    /// Edge labels with at least this many occurrences are frequent.
    pub frequent_property_threshold: u64,
    /// Scoring workers; `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
    /// Also compare range class counts before reusing old scores.
    pub check_range_classes: bool,
    pub search: SearchConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy: CountStrategy::default(),
            cache: CountCacheConfig::default(),
            frequent_property_threshold: 100_000,
            worker_threads: None,
            check_range_classes: false,
            search: SearchConfig::default(),
        }
    }
}

impl ScoringConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == Some(0) {
            return Err(Error::Config("worker_threads must be at least 1".into()));
        }
        if self.frequent_property_threshold == 0 {
            return Err(Error::Config("frequent_property_threshold must be at least 1".into()));
        }
        self.search.validate()
    }

    pub fn workers(&self) -> usize {
        resolve_workers(self.worker_threads)
    }
}

fn resolve_workers(configured: Option<usize>) -> usize {
    configured.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}
