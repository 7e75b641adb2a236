//! Confidence and difference types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::aligned::AlignedToken;
use super::draft::{BlockId, DraftId};

/// Confidence band for one alignment column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    /// Strong agreement across drafts.
    High,
    /// Partial agreement.
    Medium,
    /// Low agreement, or no contribution at all.
    Low,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Per-column tally backing a confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAgreement {
    /// Tokens contributed at this column, one per draft, in draft order.
    pub tokens: Vec<AlignedToken>,
    /// Total drafts (gap contributors included).
    pub total_drafts: usize,
    /// Drafts that contributed a real token.
    pub non_gap_count: usize,
    /// Distinct non-gap token values.
    pub distinct_count: usize,
    /// The most frequent non-gap token, ties resolved to the token seen
    /// first in draft order. `None` when the column is all gaps.
    pub leading_token: Option<String>,
    /// Occurrences of `leading_token`.
    pub leading_count: usize,
}

impl ColumnAgreement {
    /// Whether every draft contributed a gap at this column.
    pub fn is_all_gaps(&self) -> bool {
        self.non_gap_count == 0
    }
}

/// Score, band, and tally for one alignment column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceColumn {
    /// Agreement score in `[0, 1]`.
    pub score: f64,
    /// Banded confidence level.
    pub level: ConfidenceLevel,
    /// The tally the score was derived from.
    pub agreement: ColumnAgreement,
}

/// Classification of a flagged difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifferenceCategory {
    /// Bearing or measurement material: a lone direction letter, a degree
    /// mark, or a decimal point is involved.
    Coordinate,
    /// Every non-gap token is purely alphabetic.
    Word,
    /// Every non-gap token is a single non-alphanumeric character.
    Punctuation,
    /// Anything else.
    Other,
}

impl fmt::Display for DifferenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinate => write!(f, "coordinate"),
            Self::Word => write!(f, "word"),
            Self::Punctuation => write!(f, "punctuation"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A column where drafts disagree, or where some drafts are silent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Difference {
    /// Alignment column index.
    pub position: usize,
    /// Tokens at this column, one per draft, in draft order.
    pub tokens: Vec<AlignedToken>,
    /// Confidence score of the column.
    pub confidence: f64,
    /// Classified kind of disagreement.
    pub category: DifferenceCategory,
}

/// Confidence analysis of one aligned block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConfidence {
    /// One entry per alignment column.
    pub columns: Vec<ConfidenceColumn>,
    /// Columns flagged as differences.
    pub differences: Vec<Difference>,
    /// Count of columns at each level: (high, medium, low).
    pub level_counts: (usize, usize, usize),
    /// Mean score across columns, 0.0 for an empty block.
    pub mean_score: f64,
}

impl BlockConfidence {
    /// Scores in column order.
    pub fn scores(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.score).collect()
    }

    /// Levels in column order.
    pub fn levels(&self) -> Vec<ConfidenceLevel> {
        self.columns.iter().map(|c| c.level).collect()
    }
}

/// Consumer-facing difference record: the reference draft's reading
/// against each disagreeing alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifferenceRecord {
    /// Block the difference occurs in.
    pub block_id: BlockId,
    /// Alignment column index.
    pub position: usize,
    /// The reference (first) draft's token at this column.
    pub reference_token: AlignedToken,
    /// The reference draft's id.
    pub reference_draft: DraftId,
    /// Drafts whose token differs from the reference, with their tokens.
    pub alternatives: Vec<(DraftId, AlignedToken)>,
    /// Confidence score of the column.
    pub confidence: f64,
    /// Classified kind of disagreement.
    pub category: DifferenceCategory,
}
