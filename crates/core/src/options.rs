use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the pruning threshold evolves while descending the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Each included child's subtree is pruned against
    /// `child.cumulative_time / child_divisor`.
    #[default]
    Tightening,
    /// Every level is pruned against the top-level threshold.
    Fixed,
}

/// Which profiled functions may serve as the tree root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootMatch {
    /// Any function defined at the entry point, whoever called it.
    #[default]
    Loose,
    /// Only a function defined at the entry point with no recorded callers.
    Strict,
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be a positive finite number, got {value}")]
    InvalidDivisor { field: &'static str, value: f64 },
    #[error("max_depth must be at most {limit}, got {value}")]
    MaxDepthTooLarge { value: u32, limit: u32 },
}

/// Tree building and pruning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Nodes at this depth are emitted without children.
    pub max_depth: u32,
    /// Top-level threshold is `root.cumulative_time / root_divisor`.
    pub root_divisor: f64,
    /// Tightened threshold for a child's subtree is
    /// `child.cumulative_time / child_divisor`.
    pub child_divisor: f64,
    pub threshold_mode: ThresholdMode,
    pub root_match: RootMatch,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            root_divisor: 8.0,
            child_divisor: 16.0,
            threshold_mode: ThresholdMode::Tightening,
            root_match: RootMatch::Loose,
        }
    }
}

impl TreeOptions {
    /// Largest accepted `max_depth`.
    pub const MAX_DEPTH_LIMIT: u32 = 1_000;

    /// Parse options from JSON; omitted fields keep their defaults.
    pub fn from_json(data: &[u8]) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_slice(data)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        for (field, value) in [
            ("root_divisor", self.root_divisor),
            ("child_divisor", self.child_divisor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(OptionsError::InvalidDivisor { field, value });
            }
        }
        if self.max_depth > Self::MAX_DEPTH_LIMIT {
            return Err(OptionsError::MaxDepthTooLarge {
                value: self.max_depth,
                limit: Self::MAX_DEPTH_LIMIT,
            });
        }
        Ok(())
    }

    pub fn root_threshold(&self, root_cumulative_time: f64) -> f64 {
        root_cumulative_time / self.root_divisor
    }

    /// Threshold applied below a child that passed `current`.
    pub fn child_threshold(&self, child_cumulative_time: f64, current: f64) -> f64 {
        match self.threshold_mode {
            ThresholdMode::Tightening => child_cumulative_time / self.child_divisor,
            ThresholdMode::Fixed => current,
        }
    }
}
