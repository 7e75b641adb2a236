//! Run-level report types.
//!
//! A run always produces an [`AlignmentRun`], never a raw error: the
//! success flag, error message, timing, and whatever was computed before
//! a failure are carried explicitly so that no already-computed data is
//! silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aligned::{AlignedBlock, AlignmentMethod};
use super::confidence::{BlockConfidence, ConfidenceLevel, DifferenceRecord};
use super::draft::DraftId;
use crate::canonical::canonical_hash_hex;

/// Everything computed for one block: alignment, confidence, consensus,
/// and per-draft format reconstructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResult {
    /// The aligned block.
    pub aligned: AlignedBlock,
    /// Per-column confidence analysis.
    pub confidence: BlockConfidence,
    /// Consensus text synthesized for this block.
    pub consensus_text: String,
    /// Format-faithful display text per draft, in draft order.
    pub reconstructions: Vec<(DraftId, String)>,
    /// Differences in consumer-facing reference-vs-alternatives form.
    pub differences: Vec<DifferenceRecord>,
}

/// Aggregate statistics over a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Blocks processed.
    pub total_blocks: usize,
    /// Blocks that fell back to the degraded alignment.
    pub degraded_blocks: usize,
    /// Blocks present in only one draft, passed through un-aligned.
    pub single_draft_blocks: usize,
    /// Alignment columns across all blocks.
    pub total_positions: usize,
    /// Flagged differences across all blocks.
    pub total_differences: usize,
    /// Columns at high confidence.
    pub high_confidence_positions: usize,
    /// Columns at medium confidence.
    pub medium_confidence_positions: usize,
    /// Columns at low confidence.
    pub low_confidence_positions: usize,
    /// Mean confidence across all columns, 0.0 when there are none.
    pub average_confidence: f64,
    /// Deterministic fingerprint of the block results: same drafts + same
    /// configuration produce the same value.
    pub alignment_fingerprint: String,
}

impl RunSummary {
    /// Fold block results into a summary, computing the fingerprint.
    pub fn from_blocks(blocks: &[BlockResult]) -> Self {
        let mut summary = Self {
            total_blocks: blocks.len(),
            alignment_fingerprint: canonical_hash_hex(&blocks),
            ..Self::default()
        };

        let mut score_sum = 0.0;
        for block in blocks {
            match block.aligned.method {
                AlignmentMethod::Degraded => summary.degraded_blocks += 1,
                AlignmentMethod::SingleDraft => summary.single_draft_blocks += 1,
                _ => {}
            }
            summary.total_positions += block.confidence.columns.len();
            summary.total_differences += block.differences.len();
            for column in &block.confidence.columns {
                score_sum += column.score;
                match column.level {
                    ConfidenceLevel::High => summary.high_confidence_positions += 1,
                    ConfidenceLevel::Medium => summary.medium_confidence_positions += 1,
                    ConfidenceLevel::Low => summary.low_confidence_positions += 1,
                }
            }
        }
        if summary.total_positions > 0 {
            summary.average_confidence = score_sum / summary.total_positions as f64;
        }

        summary
    }
}

/// Structured result of one alignment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentRun {
    /// Whether the run completed.
    pub success: bool,
    /// Error message when `success` is false.
    pub error: Option<String>,
    /// Unique id of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Per-block results (empty when validation rejected the input).
    pub blocks: Vec<BlockResult>,
    /// Aggregate statistics.
    pub summary: RunSummary,
    /// Consensus document: block consensus texts joined in block order.
    pub consensus_document: String,
    /// Content hash per input draft, for provenance.
    pub draft_content_hashes: Vec<(DraftId, String)>,
}
