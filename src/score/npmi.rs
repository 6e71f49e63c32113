//! NPMI scoring.
//!
//! With `max` candidate pairs as the sample space:
//!
//! ```text
//! p(path ∧ property) = co / max
//! p(path)            = occ / max
//! p(property)        = predOcc / max
//!
//! NPMI = ln(p_co / (p_path · p_prop)) / −ln(p_co)
//! ```
//!
//! NaN when nothing co-occurs or any probability is 0: "no evidence yet",
//! which is not the same as the anti-correlation a computed -1 expresses.

use tracing::debug;

use crate::count::CountRetriever;
use crate::model::*;
use crate::Result;
use super::PathScorer;

/// NPMI from raw counts.
pub fn npmi(counts: CountTriple, predicate_instances: u64) -> f64 {
    let CountTriple { occurrences, cooccurrences, max_count } = counts;
    if cooccurrences == 0 || max_count == 0 || occurrences == 0 || predicate_instances == 0 {
        return f64::NAN;
    }
    let max = max_count as f64;
    let p_co = cooccurrences as f64 / max;
    let p_path = occurrences as f64 / max;
    let p_predicate = predicate_instances as f64 / max;

    // Path and property hold for every candidate pair: -ln(1) = 0.
    if p_co >= 1.0 {
        return 1.0;
    }
    let pmi = (p_co / (p_path * p_predicate)).ln();
    (pmi / -p_co.ln()).clamp(-1.0, 1.0)
}

/// `PathScorer` computing NPMI from a `CountRetriever`.
pub struct NpmiScorer<R> {
    retriever: R,
}

impl<R: CountRetriever> NpmiScorer<R> {
    pub fn new(retriever: R) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &R {
        &self.retriever
    }
}

impl<R: CountRetriever> PathScorer for NpmiScorer<R> {
    fn score(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<ScoredPath> {
        let counts = self.retriever.count_all(predicate, path)?;
        if counts.cooccurrences == 0 || counts.max_count == 0 {
            debug!(path = %path, ?counts, "undefined score");
            return Ok(ScoredPath::new(path.clone(), f64::NAN));
        }
        let predicate_instances = self.retriever.count_predicate_instances(predicate)?;
        let score = npmi(counts, predicate_instances);
        debug!(path = %path, ?counts, predicate_instances, score, "scored path");
        Ok(ScoredPath::new(path.clone(), score))
    }
}
