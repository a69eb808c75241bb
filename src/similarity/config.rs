//! Clustering parameters

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default shingle size (tokens per shingle)
pub const DEFAULT_SHINGLE_SIZE: usize = 5;

/// Default Jaccard threshold for linking two responses
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;

/// Invalid clustering parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Shingle size must be at least 1, got {0}")]
    ShingleSize(usize),

    #[error("Similarity threshold must lie in [0, 1], got {0}")]
    Threshold(f64),
}

/// Unit a shingle window slides over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShingleUnit {
    /// Whitespace-separated words
    #[default]
    Word,
    /// Unicode scalar values
    Character,
}

/// Validated parameters for shingling and clustering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    shingle_size: usize,
    threshold: f64,
    unit: ShingleUnit,
}

impl ClusterConfig {
    /// Word shingles of `shingle_size` tokens, linked at `threshold` or above
    pub fn new(shingle_size: usize, threshold: f64) -> Result<Self, ConfigError> {
        if shingle_size == 0 {
            return Err(ConfigError::ShingleSize(shingle_size));
        }
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Threshold(threshold));
        }
        Ok(Self {
            shingle_size,
            threshold,
            unit: ShingleUnit::Word,
        })
    }

    pub fn with_unit(mut self, unit: ShingleUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn shingle_size(&self) -> usize {
        self.shingle_size
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn unit(&self) -> ShingleUnit {
        self.unit
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            shingle_size: DEFAULT_SHINGLE_SIZE,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            unit: ShingleUnit::Word,
        }
    }
}
