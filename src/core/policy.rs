//! Named classification policies.
//!
//! Two policies are in use: the realtime single-cell path and the periodic
//! batch path. They differ in window lengths and cutoffs and neither is
//! canonical, so both are exposed as presets and selected by configuration.

use crate::core::aggregate::Windows;
use crate::core::classify::Thresholds;
use crate::core::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Window lengths plus thresholds: everything a classification pass needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Recent window length
    #[serde(with = "crate::config::duration_serde")]
    pub recent_window: Duration,
    /// Baseline window length
    #[serde(with = "crate::config::duration_serde")]
    pub baseline_window: Duration,
    pub thresholds: Thresholds,
}

impl Policy {
    /// Policy of the live, per-observer path: 2 min over 10 min, at least
    /// 3 heartbeats before deciding, only an empty recent window is silent.
    pub fn realtime() -> Self {
        Self {
            recent_window: Duration::from_secs(2 * 60),
            baseline_window: Duration::from_secs(10 * 60),
            thresholds: Thresholds {
                min_baseline_for_decision: 3,
                silent_ratio: 0.0,
                reduced_ratio: 0.6,
                medium_confidence_baseline: 3,
                high_confidence_baseline: 5,
            },
        }
    }

    /// Policy of the periodic all-cells pass: 5 min over 35 min, any observed
    /// cell is decided, ratios under 0.2 count as silent.
    pub fn batch() -> Self {
        Self {
            recent_window: Duration::from_secs(5 * 60),
            baseline_window: Duration::from_secs(35 * 60),
            thresholds: Thresholds {
                min_baseline_for_decision: 1,
                silent_ratio: 0.2,
                reduced_ratio: 0.6,
                medium_confidence_baseline: 3,
                high_confidence_baseline: 5,
            },
        }
    }

    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Realtime => Self::realtime(),
            Preset::Batch => Self::batch(),
        }
    }

    pub fn windows(&self) -> Windows {
        Windows::new(self.recent_window, self.baseline_window)
    }

    /// Validate windows and thresholds together.
    pub fn validate(&self) -> EngineResult<()> {
        self.windows().validate()?;
        self.thresholds.validate()
    }
}

/// Names of the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Realtime,
    Batch,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Realtime, Preset::Batch];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Realtime => "realtime",
            Preset::Batch => "batch",
        }
    }
}

impl FromStr for Preset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "realtime" => Ok(Preset::Realtime),
            "batch" => Ok(Preset::Batch),
            other => Err(EngineError::InvalidInput(format!(
                "unknown policy preset: {other}"
            ))),
        }
    }
}
