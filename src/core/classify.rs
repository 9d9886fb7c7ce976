//! Status and confidence classification of windowed counts.
//!
//! Status compares a cell's recent activity to its own baseline. Confidence
//! depends only on how much baseline evidence exists and is computed
//! independently of status.

use crate::core::aggregate::WindowCounts;
use crate::core::error::{EngineError, EngineResult};
use crate::core::grid::CellId;
use serde::{Deserialize, Serialize};

/// Activity tier of a cell relative to its own baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not enough history to decide
    Baseline,
    Silent,
    Reduced,
    Normal,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Baseline => "baseline",
            Status::Silent => "silent",
            Status::Reduced => "reduced",
            Status::Normal => "normal",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much baseline evidence backs a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cutoffs used by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Baseline count below which the status stays `baseline`
    pub min_baseline_for_decision: u64,
    /// recent/baseline ratio below which a cell is `silent`
    pub silent_ratio: f64,
    /// recent/baseline ratio below which a cell is `reduced`
    pub reduced_ratio: f64,
    /// Baseline count at which confidence becomes `medium`
    pub medium_confidence_baseline: u64,
    /// Baseline count at which confidence becomes `high`
    pub high_confidence_baseline: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_baseline_for_decision: 3,
            silent_ratio: 0.0,
            reduced_ratio: 0.6,
            medium_confidence_baseline: 3,
            high_confidence_baseline: 5,
        }
    }
}

impl Thresholds {
    /// Check the cutoffs describe a usable policy.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, ratio) in [
            ("silent_ratio", self.silent_ratio),
            ("reduced_ratio", self.reduced_ratio),
        ] {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "{name} must be a non-negative number, got {ratio}"
                )));
            }
        }
        if self.medium_confidence_baseline > self.high_confidence_baseline {
            return Err(EngineError::InvalidInput(format!(
                "medium confidence baseline ({}) exceeds high confidence baseline ({})",
                self.medium_confidence_baseline, self.high_confidence_baseline
            )));
        }
        Ok(())
    }
}

/// Outcome of classifying one cell. Ephemeral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub cell_id: CellId,
    pub status: Status,
    pub confidence: Confidence,
    pub recent_count: u64,
    pub baseline_count: u64,
}

/// Classify windowed counts.
///
/// Rules are evaluated in order and the first match wins:
/// 1. baseline below `min_baseline_for_decision` -> `Baseline`
/// 2. no recent heartbeats -> `Silent`
/// 3. ratio below `silent_ratio` -> `Silent`
/// 4. ratio below `reduced_ratio` -> `Reduced`
/// 5. otherwise `Normal`
pub fn classify(counts: &WindowCounts, thresholds: &Thresholds) -> EngineResult<ClassificationResult> {
    thresholds.validate()?;

    let recent = counts.recent_count;
    let baseline = counts.baseline_count;
    if recent > baseline {
        return Err(EngineError::InvalidInput(format!(
            "recent count {recent} exceeds baseline count {baseline}"
        )));
    }

    let status = if baseline < thresholds.min_baseline_for_decision {
        Status::Baseline
    } else if recent == 0 {
        Status::Silent
    } else {
        // baseline >= recent > 0 here
        let ratio = recent as f64 / baseline as f64;
        if ratio < thresholds.silent_ratio {
            Status::Silent
        } else if ratio < thresholds.reduced_ratio {
            Status::Reduced
        } else {
            Status::Normal
        }
    };

    Ok(ClassificationResult {
        cell_id: counts.cell_id,
        status,
        confidence: confidence_for(baseline, thresholds),
        recent_count: recent,
        baseline_count: baseline,
    })
}

/// Confidence tier from the baseline count alone.
pub fn confidence_for(baseline_count: u64, thresholds: &Thresholds) -> Confidence {
    if baseline_count >= thresholds.high_confidence_baseline {
        Confidence::High
    } else if baseline_count >= thresholds.medium_confidence_baseline {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(recent: u64, baseline: u64) -> WindowCounts {
        WindowCounts::new(CellId::new(0, 0), recent, baseline).unwrap()
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            min_baseline_for_decision: 3,
            silent_ratio: 0.2,
            reduced_ratio: 0.6,
            medium_confidence_baseline: 3,
            high_confidence_baseline: 10,
        }
    }

    #[test]
    fn test_insufficient_baseline() {
        for recent in 0..=2 {
            let result = classify(&counts(recent, 2), &thresholds()).unwrap();
            assert_eq!(result.status, Status::Baseline);
            assert_eq!(result.confidence, Confidence::Low);
        }
    }

    #[test]
    fn test_silent_with_high_confidence() {
        let result = classify(&counts(0, 10), &thresholds()).unwrap();
        assert_eq!(result.status, Status::Silent);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_reduced_with_medium_confidence() {
        let result = classify(&counts(2, 5), &thresholds()).unwrap();
        assert_eq!(result.status, Status::Reduced);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_silent_ratio() {
        let result = classify(&counts(1, 10), &thresholds()).unwrap();
        assert_eq!(result.status, Status::Silent);

        // With a zero silent ratio only an empty recent window is silent.
        let zero = Thresholds {
            silent_ratio: 0.0,
            ..thresholds()
        };
        assert_eq!(classify(&counts(1, 10), &zero).unwrap().status, Status::Reduced);
    }

    #[test]
    fn test_normal() {
        let result = classify(&counts(6, 10), &thresholds()).unwrap();
        assert_eq!(result.status, Status::Normal);
        assert_eq!(result.recent_count, 6);
        assert_eq!(result.baseline_count, 10);
    }

    #[test]
    fn test_status_monotone_in_recent_count() {
        let baseline = 20;
        let mut previous = Status::Normal;
        for recent in (0..=baseline).rev() {
            let status = classify(&counts(recent, baseline), &thresholds())
                .unwrap()
                .status;
            assert!(status <= previous, "{recent}: {status} after {previous}");
            previous = status;
        }
    }

    #[test]
    fn test_confidence_ignores_recent_count() {
        for baseline in 0..15 {
            let expected = confidence_for(baseline, &thresholds());
            for recent in 0..=baseline {
                let result = classify(&counts(recent, baseline), &thresholds()).unwrap();
                assert_eq!(result.confidence, expected);
            }
        }
    }

    #[test]
    fn test_rejects_recent_above_baseline() {
        let bad = WindowCounts {
            cell_id: CellId::new(0, 0),
            recent_count: 4,
            baseline_count: 3,
        };
        assert!(matches!(
            classify(&bad, &thresholds()),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let nan = Thresholds {
            reduced_ratio: f64::NAN,
            ..thresholds()
        };
        assert!(classify(&counts(1, 5), &nan).is_err());

        let inverted = Thresholds {
            medium_confidence_baseline: 11,
            ..thresholds()
        };
        assert!(classify(&counts(1, 5), &inverted).is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Silent).unwrap(), "\"silent\"");
        assert_eq!(serde_json::to_string(&Confidence::High).unwrap(), "\"high\"");
    }
}
