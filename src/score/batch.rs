//! Batch scoring of every candidate path of one property.
//!
//! ```text
//! paths ─┬─ already scored ──────────────────────────────┐
//!        ├─ reusable from a previous run ────────────────┤
//!        └─ to score ─┬─ easy: by potential frequency, ──┤── PropertyScores
//!                     │        on the rayon pool         │
//!                     └─ hard: one after another, last ──┘
//! ```
//!
//! A path needs scoring when its score is NaN or 0.0. Paths touching more
//! than one frequent edge label fan out on every hop; they are kept off the
//! pool so a few of them cannot occupy every worker at once. A failed
//! count gives the path a NaN score and records it in `failed`; it never
//! stops the batch.

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::histogram::{is_hard_path, Histogram};
use crate::model::*;
use crate::{Error, Result};
use super::{PathScorer, ScoreSummary};

// ============================================================================
// Score reuse
// ============================================================================

/// Histograms of the previous and the current dataset version.
#[derive(Debug, Clone, Default)]
pub struct ReuseHistograms {
    pub old_properties: Histogram,
    pub new_properties: Histogram,
    pub old_classes: Histogram,
    pub new_classes: Histogram,
}

/// Scores from a previous run of the same property.
#[derive(Debug, Clone, Default)]
pub struct ScoreReuse {
    pub previous: HashMap<RestrictedPath, f64>,
    /// Without histograms, previous scores are taken as they are. With
    /// them, only where the dataset did not change in a relevant way.
    pub histograms: Option<ReuseHistograms>,
}

impl ScoreReuse {
    pub fn from_scored(paths: impl IntoIterator<Item = ScoredPath>) -> Self {
        Self {
            previous: paths.into_iter().map(|p| (p.path, p.score)).collect(),
            histograms: None,
        }
    }

    pub fn with_histograms(mut self, histograms: ReuseHistograms) -> Self {
        self.histograms = Some(histograms);
        self
    }

    /// A previous score worth keeping.
    fn usable_score(&self, path: &RestrictedPath) -> Option<f64> {
        self.previous
            .get(path)
            .copied()
            .filter(|score| !score.is_nan() && *score != 0.0)
    }
}

impl ReuseHistograms {
    fn classes_agree(restriction: Option<&TypeRestriction>, old: &Histogram, new: &Histogram) -> bool {
        match restriction.and_then(TypeRestriction::classes) {
            Some(classes) => classes.iter().all(|class| old.agrees_with(new, class)),
            None => true,
        }
    }

    /// The candidate sets of the predicate kept their size.
    fn predicate_unchanged(&self, predicate: &Predicate, check_range: bool) -> bool {
        Self::classes_agree(predicate.domain.as_ref(), &self.old_classes, &self.new_classes)
            && (!check_range
                || Self::classes_agree(predicate.range.as_ref(), &self.old_classes, &self.new_classes))
    }

    /// Every edge label of the path kept its count.
    fn path_unchanged(&self, path: &RestrictedPath) -> bool {
        path.properties()
            .all(|label| self.old_properties.agrees_with(&self.new_properties, label))
    }
}

// ============================================================================
// PropertyScorer
// ============================================================================

/// The scored paths of one property.
#[derive(Debug, Clone, Default)]
pub struct PropertyScores {
    pub paths: Vec<ScoredPath>,
    pub summary: ScoreSummary,
    /// Paths whose counting failed; score them again later.
    pub failed: HashSet<RestrictedPath>,
}

/// Scores all paths of a property on a dedicated rayon pool.
pub struct PropertyScorer<S> {
    scorer: S,
    pool: rayon::ThreadPool,
    histogram: Histogram,
    frequent: HashSet<Iri>,
    frequent_threshold: u64,
    check_range_classes: bool,
}

impl<S: PathScorer> PropertyScorer<S> {
    pub fn new(scorer: S, config: &ScoringConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers())
            .thread_name(|i| format!("copaal-score-{i}"))
            .build()
            .map_err(|e| Error::Config(format!("scoring pool: {e}")))?;
        Ok(Self {
            scorer,
            pool,
            histogram: Histogram::new(),
            frequent: HashSet::new(),
            frequent_threshold: config.frequent_property_threshold,
            check_range_classes: config.check_range_classes,
        })
    }

    /// Edge label counts of the current dataset, used to classify and
    /// order paths.
    pub fn with_histogram(mut self, histogram: Histogram) -> Self {
        self.frequent = histogram.frequent(self.frequent_threshold);
        self.histogram = histogram;
        self
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn is_hard(&self, path: &RestrictedPath) -> bool {
        is_hard_path(path, &self.frequent)
    }

    /// Score every path of `predicate` that still needs a score.
    ///
    /// Duplicate paths are merged, keeping the first.
    pub fn score_property(
        &self,
        predicate: &Predicate,
        paths: impl IntoIterator<Item = ScoredPath>,
        reuse: Option<&ScoreReuse>,
    ) -> PropertyScores {
        let property = &*predicate.property;
        let mut seen = HashSet::new();
        let mut paths: Vec<ScoredPath> = paths
            .into_iter()
            .filter(|p| seen.insert(p.path.clone()))
            .collect();

        let mut reused = 0;
        if let Some(reuse) = reuse {
            let allowed = match &reuse.histograms {
                None => true,
                Some(histograms) => {
                    let unchanged = histograms.predicate_unchanged(predicate, self.check_range_classes);
                    info!(property, reusable = unchanged, "compared class histograms");
                    unchanged
                }
            };
            if allowed {
                for scored in paths.iter_mut().filter(|p| p.needs_rescoring()) {
                    let path_ok = reuse
                        .histograms
                        .as_ref()
                        .is_none_or(|h| h.path_unchanged(&scored.path));
                    if let Some(score) = reuse.usable_score(&scored.path).filter(|_| path_ok) {
                        debug!(property, path = %scored.path, score, "reusing score");
                        scored.score = score;
                        reused += 1;
                    }
                }
            }
        }

        let (hard, mut easy): (Vec<RestrictedPath>, Vec<RestrictedPath>) = paths
            .iter()
            .filter(|p| p.needs_rescoring())
            .map(|p| p.path.clone())
            .partition(|path| self.is_hard(path));
        easy.sort_by_cached_key(|path| std::cmp::Reverse(self.histogram.potential_frequency(path)));

        info!(
            property,
            total = paths.len(),
            easy = easy.len(),
            hard = hard.len(),
            reused,
            "scoring paths"
        );

        let mut results: Vec<(RestrictedPath, Result<ScoredPath>)> = self.pool.install(|| {
            easy.into_par_iter()
                .map(|path| {
                    let scored = self.scorer.score(predicate, &path);
                    (path, scored)
                })
                .collect()
        });
        results.extend(hard.into_iter().map(|path| {
            let scored = self.scorer.score(predicate, &path);
            (path, scored)
        }));

        let mut failed = HashSet::new();
        let mut fresh: HashMap<RestrictedPath, f64> = HashMap::with_capacity(results.len());
        for (path, outcome) in results {
            let score = match outcome {
                Ok(scored) => scored.score,
                Err(e) => {
                    warn!(property, path = %path, error = %e, "scoring failed");
                    failed.insert(path.clone());
                    f64::NAN
                }
            };
            fresh.insert(path, score);
        }

        let mut summary = ScoreSummary { reused, failed: failed.len(), ..ScoreSummary::default() };
        for scored in &mut paths {
            if let Some(score) = fresh.get(&scored.path) {
                scored.score = *score;
            }
            summary.record(scored.score);
        }
        summary.log(property);

        PropertyScores { paths, summary, failed }
    }
}
