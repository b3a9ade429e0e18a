//! Hyperparameters of the characterization engine.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default fraction of the compliance current that counts as "set".
pub const DEFAULT_SET_THRESHOLD: f64 = 0.9;

/// Default bound on |d²I/dV²| inside the linear regime of a reset sweep.
pub const DEFAULT_LINEARITY_THRESHOLD: f64 = 5e-3;

/// Tunable thresholds used by set-voltage and on-resistance detection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fraction of the compliance current a set/form sweep must reach.
    pub set_threshold: f64,
    /// Curvature above which a reset sweep is no longer linear.
    pub linearity_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            set_threshold: DEFAULT_SET_THRESHOLD,
            linearity_threshold: DEFAULT_LINEARITY_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    pub fn with_set_threshold(mut self, set_threshold: f64) -> Self {
        self.set_threshold = set_threshold;
        self
    }

    pub fn with_linearity_threshold(mut self, linearity_threshold: f64) -> Self {
        self.linearity_threshold = linearity_threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.set_threshold.is_finite() || self.set_threshold <= 0.0 || self.set_threshold > 1.0 {
            return Err(Error::InvalidConfig(format!(
                "set_threshold must be in (0, 1], got {}",
                self.set_threshold
            )));
        }
        if !self.linearity_threshold.is_finite() || self.linearity_threshold <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "linearity_threshold must be positive, got {}",
                self.linearity_threshold
            )));
        }
        Ok(())
    }

    /// Bit-exact identity of the hyperparameter set, used as a cache key.
    pub(crate) fn cache_key(&self) -> (u64, u64) {
        (self.set_threshold.to_bits(), self.linearity_threshold.to_bits())
    }
}
