//! Alignment configuration: scoring parameters and confidence thresholds.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Threshold floats are quantized to integers before hashing to avoid
//! cross-platform serialization differences. The quantization factor is
//! 1e6 (multiply by 1,000,000 and round to i64).

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_CONFIG_VERSION;

/// Quantization factor for float normalization.
const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Quantize a float to an i64 for deterministic hashing.
fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

/// Quantized config parameters for deterministic hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuantizedConfigParams {
    version: String,
    match_score: i32,
    fuzzy_match_score: i32,
    mismatch_score: i32,
    gap_open_score: i32,
    gap_extend_score: i32,
    high_confidence_threshold: i64,
    medium_confidence_threshold: i64,
    max_dp_cells: usize,
    fuzzy_cache_capacity: usize,
}

/// Error for a configuration that cannot satisfy the scoring contract.
///
/// Raised at engine construction, fatal for the whole run: there is no
/// meaningful way to align with, say, a gap opening that is cheaper than
/// a gap extension.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigContractError {
    /// Match score must be positive.
    #[error("match_score must be positive, got {0}")]
    NonPositiveMatch(i32),
    /// Fuzzy match score must be positive and below the exact match score.
    #[error("fuzzy_match_score must satisfy 0 < fuzzy ({fuzzy}) < match ({exact})")]
    BadFuzzy {
        /// The configured fuzzy score.
        fuzzy: i32,
        /// The configured exact-match score.
        exact: i32,
    },
    /// Mismatch score must be negative.
    #[error("mismatch_score must be negative, got {0}")]
    NonNegativeMismatch(i32),
    /// Opening a gap must cost strictly more than extending one, and both
    /// must cost something.
    #[error("gap scores must satisfy open ({open}) < extend ({extend}) < 0")]
    BadGapScores {
        /// The configured gap-open score.
        open: i32,
        /// The configured gap-extend score.
        extend: i32,
    },
    /// Confidence thresholds must satisfy 0 < medium < high <= 1.
    #[error("confidence thresholds must satisfy 0 < medium ({medium}) < high ({high}) <= 1")]
    BadThresholds {
        /// The configured high threshold.
        high: f64,
        /// The configured medium threshold.
        medium: f64,
    },
    /// The DP cell budget must allow at least a trivial alignment.
    #[error("max_dp_cells must be positive")]
    ZeroCellBudget,
    /// The fuzzy-match cache needs at least one slot.
    #[error("fuzzy_cache_capacity must be positive")]
    ZeroCacheCapacity,
}

/// Configuration for one alignment run.
///
/// ## Scoring contract
///
/// - Exact token match scores `match_score` (positive).
/// - Tokens within edit distance 1 score `fuzzy_match_score` (a smaller
///   positive value, catching single-character OCR slips).
/// - Any other pair scores `mismatch_score` (negative).
/// - Opening a gap costs `gap_open_score`, extending one costs
///   `gap_extend_score`; opening is strictly costlier, which discourages
///   many short gaps in favor of fewer longer ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Config version identifier.
    pub version: String,
    /// Score for an exact token match.
    pub match_score: i32,
    /// Score for tokens within edit distance 1.
    pub fuzzy_match_score: i32,
    /// Score for a mismatching token pair.
    pub mismatch_score: i32,
    /// Cost of opening a gap.
    pub gap_open_score: i32,
    /// Cost of extending an already-open gap.
    pub gap_extend_score: i32,
    /// Column score at or above which confidence is High.
    pub high_confidence_threshold: f64,
    /// Column score at or above which confidence is Medium.
    pub medium_confidence_threshold: f64,
    /// Budget on DP matrix cells for one pairwise alignment; exceeding it
    /// degrades the block instead of aborting the run.
    pub max_dp_cells: usize,
    /// Capacity of the run-scoped edit-distance memo cache.
    pub fuzzy_cache_capacity: usize,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_CONFIG_VERSION.to_string(),
            match_score: 5,
            fuzzy_match_score: 2,
            mismatch_score: -3,
            gap_open_score: -4,
            gap_extend_score: -1,
            high_confidence_threshold: 0.8,
            medium_confidence_threshold: 0.4,
            max_dp_cells: 4_000_000,
            fuzzy_cache_capacity: 4096,
        }
    }
}

impl AlignmentConfig {
    /// Check the scoring contract. Called at engine construction.
    pub fn validate(&self) -> Result<(), ConfigContractError> {
        if self.match_score <= 0 {
            return Err(ConfigContractError::NonPositiveMatch(self.match_score));
        }
        if self.fuzzy_match_score <= 0 || self.fuzzy_match_score >= self.match_score {
            return Err(ConfigContractError::BadFuzzy {
                fuzzy: self.fuzzy_match_score,
                exact: self.match_score,
            });
        }
        if self.mismatch_score >= 0 {
            return Err(ConfigContractError::NonNegativeMismatch(self.mismatch_score));
        }
        if self.gap_open_score >= self.gap_extend_score || self.gap_extend_score >= 0 {
            return Err(ConfigContractError::BadGapScores {
                open: self.gap_open_score,
                extend: self.gap_extend_score,
            });
        }
        let high = self.high_confidence_threshold;
        let medium = self.medium_confidence_threshold;
        if !(medium > 0.0 && medium < high && high <= 1.0) {
            return Err(ConfigContractError::BadThresholds { high, medium });
        }
        if self.max_dp_cells == 0 {
            return Err(ConfigContractError::ZeroCellBudget);
        }
        if self.fuzzy_cache_capacity == 0 {
            return Err(ConfigContractError::ZeroCacheCapacity);
        }
        Ok(())
    }

    /// Compute a hash of the config parameters.
    ///
    /// Threshold floats are quantized so the hash is identical across
    /// platforms and serializer versions.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&self.to_quantized())
    }

    fn to_quantized(&self) -> QuantizedConfigParams {
        QuantizedConfigParams {
            version: self.version.clone(),
            match_score: self.match_score,
            fuzzy_match_score: self.fuzzy_match_score,
            mismatch_score: self.mismatch_score,
            gap_open_score: self.gap_open_score,
            gap_extend_score: self.gap_extend_score,
            high_confidence_threshold: quantize_float(self.high_confidence_threshold),
            medium_confidence_threshold: quantize_float(self.medium_confidence_threshold),
            max_dp_cells: self.max_dp_cells,
            fuzzy_cache_capacity: self.fuzzy_cache_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AlignmentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_cheap_gap_open() {
        let mut config = AlignmentConfig::default();
        config.gap_open_score = -1;
        config.gap_extend_score = -4;
        assert!(matches!(
            config.validate(),
            Err(ConfigContractError::BadGapScores { .. })
        ));
    }

    #[test]
    fn test_rejects_fuzzy_above_match() {
        let mut config = AlignmentConfig::default();
        config.fuzzy_match_score = 7;
        assert!(matches!(
            config.validate(),
            Err(ConfigContractError::BadFuzzy { .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = AlignmentConfig::default();
        config.medium_confidence_threshold = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigContractError::BadThresholds { .. })
        ));
    }

    #[test]
    fn test_params_hash_determinism() {
        let a = AlignmentConfig::default();
        let b = AlignmentConfig::default();
        assert_eq!(a.params_hash(), b.params_hash());
    }

    #[test]
    fn test_params_hash_changes_with_scoring() {
        let a = AlignmentConfig::default();
        let mut b = AlignmentConfig::default();
        b.match_score = 10;
        assert_ne!(a.params_hash(), b.params_hash());
    }
}
