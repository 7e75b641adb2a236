//! Aligned block types.
//!
//! ## Invariants
//!
//! 1. Every `tokens` array in one [`AlignedBlock`] has length equal to
//!    `alignment_length`.
//! 2. `original_to_alignment` is strictly increasing, carries one entry
//!    per non-gap original token, and every value lies in
//!    `[0, alignment_length)`.
//!
//! Both are enforced by [`AlignedBlock::new`], which is the only way the
//! aligner assembles a block.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::draft::{BlockId, DraftId};

/// One cell of an aligned sequence: a normalized token or a gap.
///
/// The gap is its own variant, so it can never collide with a normalized
/// token value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlignedToken {
    /// A normalized token contributed by the draft.
    Token(String),
    /// The draft contributes nothing at this column.
    Gap,
}

impl AlignedToken {
    /// Create a token cell.
    pub fn token(s: impl Into<String>) -> Self {
        Self::Token(s.into())
    }

    /// Whether this cell is a gap.
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap)
    }

    /// The token text, or `None` for a gap.
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(s) => Some(s),
            Self::Gap => None,
        }
    }
}

impl fmt::Display for AlignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(s) => write!(f, "{}", s),
            Self::Gap => write!(f, "-"),
        }
    }
}

/// How a block's alignment was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentMethod {
    /// All sequences were element-wise identical; no computation ran.
    Identical,
    /// General path: pairwise alignment against the first draft, then
    /// right-padding to a shared length.
    ReferencePairwise,
    /// The general path failed internally; sequences were naively padded
    /// with trailing gaps, with no optimization.
    Degraded,
    /// The block was present in only one draft and passed through.
    SingleDraft,
}

impl fmt::Display for AlignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identical => write!(f, "identical"),
            Self::ReferencePairwise => write!(f, "reference_pairwise"),
            Self::Degraded => write!(f, "degraded"),
            Self::SingleDraft => write!(f, "single_draft"),
        }
    }
}

/// One draft's row in an aligned block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignedSequence {
    /// The contributing draft.
    pub draft_id: DraftId,
    /// Gap-padded token row, `alignment_length` cells.
    pub tokens: Vec<AlignedToken>,
    /// For each non-gap original token (in original order), the alignment
    /// column it landed in. Strictly increasing.
    pub original_to_alignment: Vec<usize>,
}

impl AlignedSequence {
    /// Build a row from a gap-padded token vector, deriving
    /// `original_to_alignment` from the non-gap positions.
    pub fn from_tokens(draft_id: DraftId, tokens: Vec<AlignedToken>) -> Self {
        let original_to_alignment = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_gap())
            .map(|(i, _)| i)
            .collect();
        Self {
            draft_id,
            tokens,
            original_to_alignment,
        }
    }

    /// Count of non-gap cells.
    pub fn non_gap_count(&self) -> usize {
        self.tokens.iter().filter(|t| !t.is_gap()).count()
    }
}

/// Error raised when assembled sequences violate the alignment invariants.
///
/// This signals an internal aligner bug, not bad input; the engine treats
/// it as an alignment failure and falls back to the degraded path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AlignmentShapeError {
    /// A row's length differs from the block's alignment length.
    #[error("Draft {draft_id}: row length {found} != alignment length {expected}")]
    RowLength {
        /// The offending draft.
        draft_id: DraftId,
        /// Expected alignment length.
        expected: usize,
        /// Actual row length.
        found: usize,
    },
    /// An `original_to_alignment` map is not strictly increasing or is out
    /// of range.
    #[error("Draft {draft_id}: original_to_alignment is not a strictly increasing map into the alignment")]
    BadIndexMap {
        /// The offending draft.
        draft_id: DraftId,
    },
}

/// Aligned representation of one block across all drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignedBlock {
    /// The block this alignment covers.
    pub block_id: BlockId,
    /// One row per draft, all of length `alignment_length`.
    pub aligned_sequences: Vec<AlignedSequence>,
    /// Shared row length.
    pub alignment_length: usize,
    /// Number of contributing drafts.
    pub draft_count: usize,
    /// How this alignment was produced.
    pub method: AlignmentMethod,
}

impl AlignedBlock {
    /// Assemble a block, checking the alignment invariants.
    pub fn new(
        block_id: BlockId,
        aligned_sequences: Vec<AlignedSequence>,
        method: AlignmentMethod,
    ) -> Result<Self, AlignmentShapeError> {
        let alignment_length = aligned_sequences
            .first()
            .map(|s| s.tokens.len())
            .unwrap_or(0);

        for seq in &aligned_sequences {
            if seq.tokens.len() != alignment_length {
                return Err(AlignmentShapeError::RowLength {
                    draft_id: seq.draft_id.clone(),
                    expected: alignment_length,
                    found: seq.tokens.len(),
                });
            }
            let map_ok = seq.original_to_alignment.len() == seq.non_gap_count()
                && seq
                    .original_to_alignment
                    .windows(2)
                    .all(|w| w[0] < w[1])
                && seq
                    .original_to_alignment
                    .iter()
                    .all(|&i| i < alignment_length);
            if !map_ok {
                return Err(AlignmentShapeError::BadIndexMap {
                    draft_id: seq.draft_id.clone(),
                });
            }
        }

        let draft_count = aligned_sequences.len();
        Ok(Self {
            block_id,
            aligned_sequences,
            alignment_length,
            draft_count,
            method,
        })
    }

    /// Tokens contributed at one column, one per draft, in draft order.
    pub fn column(&self, position: usize) -> Vec<&AlignedToken> {
        self.aligned_sequences
            .iter()
            .map(|s| &s.tokens[position])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(draft: &str, cells: &[&str]) -> AlignedSequence {
        let tokens = cells
            .iter()
            .map(|c| {
                if *c == "-" {
                    AlignedToken::Gap
                } else {
                    AlignedToken::token(*c)
                }
            })
            .collect();
        AlignedSequence::from_tokens(DraftId::new(draft), tokens)
    }

    #[test]
    fn test_from_tokens_derives_increasing_map() {
        let seq = row("d1", &["north", "-", "east"]);
        assert_eq!(seq.original_to_alignment, vec![0, 2]);
    }

    #[test]
    fn test_new_accepts_uniform_rows() {
        let block = AlignedBlock::new(
            BlockId::new("b1"),
            vec![row("d1", &["a", "b"]), row("d2", &["a", "-"])],
            AlignmentMethod::ReferencePairwise,
        )
        .unwrap();
        assert_eq!(block.alignment_length, 2);
        assert_eq!(block.draft_count, 2);
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = AlignedBlock::new(
            BlockId::new("b1"),
            vec![row("d1", &["a", "b"]), row("d2", &["a"])],
            AlignmentMethod::ReferencePairwise,
        )
        .unwrap_err();
        assert!(matches!(err, AlignmentShapeError::RowLength { .. }));
    }

    #[test]
    fn test_new_rejects_bad_index_map() {
        let mut bad = row("d2", &["a", "b"]);
        bad.original_to_alignment = vec![1, 1];
        let err = AlignedBlock::new(
            BlockId::new("b1"),
            vec![row("d1", &["a", "b"]), bad],
            AlignmentMethod::ReferencePairwise,
        )
        .unwrap_err();
        assert!(matches!(err, AlignmentShapeError::BadIndexMap { .. }));
    }

    #[test]
    fn test_column_reads_across_drafts() {
        let block = AlignedBlock::new(
            BlockId::new("b1"),
            vec![row("d1", &["north", "east"]), row("d2", &["north", "-"])],
            AlignmentMethod::ReferencePairwise,
        )
        .unwrap();
        let col = block.column(1);
        assert_eq!(col[0].as_token(), Some("east"));
        assert!(col[1].is_gap());
    }

    #[test]
    fn test_gap_never_equals_token() {
        assert_ne!(AlignedToken::Gap, AlignedToken::token("-"));
    }
}
