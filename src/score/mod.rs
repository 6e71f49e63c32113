//! # Path Scoring
//!
//! Turns counts into evidence weights.
//!
//! | Type | Module | Description |
//! |------|--------|-------------|
//! | `NpmiScorer` | `npmi` | Normalized PMI between path and property |
//! | `PropertyScorer` | `batch` | Scores every path of one property, in parallel |
//! | `ScoreSummary` | `summary` | Zero/NaN/failed tallies of a batch |

pub mod npmi;
pub mod batch;
pub mod summary;

use std::sync::Arc;

use crate::model::*;
use crate::Result;

pub use batch::{PropertyScorer, PropertyScores, ReuseHistograms, ScoreReuse};
pub use npmi::NpmiScorer;
pub use summary::ScoreSummary;

/// Scores one path as evidence for one predicate.
pub trait PathScorer: Send + Sync {
    /// A failed count is an error; an undefined score is `Ok` with NaN.
    fn score(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<ScoredPath>;
}

impl<S: PathScorer + ?Sized> PathScorer for &S {
    fn score(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<ScoredPath> {
        (**self).score(predicate, path)
    }
}

impl<S: PathScorer + ?Sized> PathScorer for Arc<S> {
    fn score(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<ScoredPath> {
        (**self).score(predicate, path)
    }
}
