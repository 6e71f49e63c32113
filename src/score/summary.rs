//! Outcome tallies of a scoring batch.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// How the scores of one property turned out.
///
/// A property whose queries failed and one whose paths genuinely do not
/// correlate can both end up all-NaN; `failed` tells them apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub total: usize,
    pub zero: usize,
    pub nan: usize,
    /// Paths whose counting failed (their score is NaN as well).
    pub failed: usize,
    /// Paths whose score was taken from a previous run.
    pub reused: usize,
}

impl ScoreSummary {
    /// Count one final score.
    pub fn record(&mut self, score: f64) {
        self.total += 1;
        if score.is_nan() {
            self.nan += 1;
        } else if score == 0.0 {
            self.zero += 1;
        }
    }

    /// Every score is unusable.
    pub fn all_unusable(&self) -> bool {
        self.total > 0 && self.nan + self.zero >= self.total
    }

    pub fn has_unusable(&self) -> bool {
        self.nan > 0 || self.zero > 0
    }

    /// Emit the summary at the severity it deserves.
    pub fn log(&self, property: &str) {
        if self.all_unusable() {
            error!(property, summary = %self, "every score is 0.0 or NaN");
        } else if self.has_unusable() {
            warn!(property, summary = %self, "some scores are 0.0 or NaN");
        } else {
            info!(property, summary = %self, "scoring finished");
        }
    }
}

impl fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0.0 / NaN / all: {} / {} / {} (failed {}, reused {})",
            self.zero, self.nan, self.total, self.failed, self.reused
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut summary = ScoreSummary::default();
        for score in [0.5, 0.0, f64::NAN, -0.2] {
            summary.record(score);
        }
        assert_eq!(summary.total, 4);
        assert_eq!(summary.zero, 1);
        assert_eq!(summary.nan, 1);
        assert!(summary.has_unusable());
        assert!(!summary.all_unusable());
    }

    #[test]
    fn test_empty_summary_is_not_alarming() {
        let summary = ScoreSummary::default();
        assert!(!summary.all_unusable());
        assert!(!summary.has_unusable());
    }

    #[test]
    fn test_display() {
        let summary = ScoreSummary { total: 3, zero: 1, nan: 2, failed: 2, reused: 0 };
        assert!(summary.all_unusable());
        assert_eq!(summary.to_string(), "0.0 / NaN / all: 1 / 2 / 3 (failed 2, reused 0)");
    }
}
