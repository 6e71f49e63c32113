//! Frequency histograms over edge labels or classes.
//!
//! Used for scheduling, never for correctness: a path touching more than
//! one frequent edge label is *hard* (large fan-out on every hop) and is
//! scored after the easy ones; easy paths are ordered by their potential
//! frequency so the expensive ones start first. Class histograms decide
//! whether scores from a previous dataset version can be reused.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::model::{Iri, RestrictedPath};

/// `IRI → occurrence count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Histogram {
    counts: HashMap<Iri, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for `key`, 0 when absent.
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Count for `key`, distinguishing absent from 0.
    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn insert(&mut self, key: Iri, count: u64) {
        self.counts.insert(key, count);
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Labels whose count reaches `threshold`.
    pub fn frequent(&self, threshold: u64) -> HashSet<Iri> {
        self.counts
            .iter()
            .filter(|(_, count)| **count >= threshold)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Product of the counts of the path's labels, saturating.
    /// Labels missing from the histogram count as 0.
    pub fn potential_frequency(&self, path: &RestrictedPath) -> u128 {
        path.properties()
            .map(|p| u128::from(self.get(p)))
            .fold(1u128, |acc, count| acc.saturating_mul(count))
    }

    /// True if both histograms hold the same count for `key`, and both have it.
    pub fn agrees_with(&self, other: &Histogram, key: &str) -> bool {
        match (self.lookup(key), other.lookup(key)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl FromIterator<(Iri, u64)> for Histogram {
    fn from_iter<I: IntoIterator<Item = (Iri, u64)>>(iter: I) -> Self {
        Self { counts: iter.into_iter().collect() }
    }
}

/// A path is hard when more than one of its elements uses a frequent label.
pub fn is_hard_path(path: &RestrictedPath, frequent: &HashSet<Iri>) -> bool {
    path.properties().filter(|p| frequent.contains(*p)).count() > 1
}
