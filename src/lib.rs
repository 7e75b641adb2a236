//! # consensus-kernel
//!
//! Deterministic multi-draft alignment and consensus for deed
//! transcriptions.
//!
//! The kernel answers one question:
//!
//! > Given several independently produced transcriptions of the same
//! > source document, where do they agree, where do they differ, and
//! > what is the best merged reading?
//!
//! ## Core Contract
//!
//! 1. Tokenize each draft block with a format-preserving mapping back to
//!    the original text
//! 2. Align same-id blocks token-by-token across drafts into a
//!    common-length, gap-padded representation
//! 3. Score per-column agreement and flag differences for review
//! 4. Synthesize a consensus reading and reconstruct format-faithful
//!    per-draft display text
//!
//! ## Architecture
//!
//! ```text
//! Drafts → Tokenizer/FormatMapper → BlockAligner → ConfidenceScorer
//!                                         ↓               ↓
//!                              FormatReconstructor   Consensus
//!                                         ↘               ↙
//!                                         AlignmentRun
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same drafts + same configuration → identical alignment fingerprint
//! - Column tallies break ties by draft order, never by map iteration
//! - Alignment is pure CPU work: no I/O, no process-wide state; the
//!   fuzzy-match cache lives and dies with the run

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aligner;
pub mod canonical;
pub mod config;
pub mod confidence;
pub mod consensus;
pub mod engine;
pub mod format_map;
pub mod reconstruct;
pub mod tokenizer;
pub mod types;

// Re-exports
pub use aligner::{degraded_alignment, single_draft_alignment, AlignmentFailure, BlockAligner};
pub use canonical::{
    canonical_hash, canonical_hash_hex, compute_content_hash, normalize_draft_text,
    to_canonical_bytes,
};
pub use config::{AlignmentConfig, ConfigContractError};
pub use confidence::{difference_records, ConfidenceScorer};
pub use consensus::{consensus_document, consensus_text, consensus_tokens, ConsensusStrategy};
pub use engine::{AlignmentEngine, EngineError};
pub use format_map::{FormatMapping, SpanGroup, TokenPosition};
pub use reconstruct::{
    raw_fallback, FormatReconstructor, ReconstructionMismatch, Repair, RepairContext, RepairRule,
    REPAIR_RULES,
};
pub use tokenizer::{
    build_mapping, formatting_statistics, normalize_raw_token, raw_spans, tokenize_block,
    FormattingStats, RawSpan,
};
pub use types::{
    validate_drafts, AlignedBlock, AlignedSequence, AlignedToken, AlignmentMethod,
    AlignmentRun, AlignmentShapeError, Block, BlockConfidence, BlockId, BlockResult,
    ColumnAgreement, ConfidenceColumn, ConfidenceLevel, Difference, DifferenceCategory,
    DifferenceRecord, Draft, DraftId, RunSummary, ValidationError,
};

/// Schema version for all consensus kernel types.
/// Increment on breaking changes to any schema type.
pub const CONSENSUS_KERNEL_SCHEMA_VERSION: &str = "1.0.0";

/// Default configuration version identifier.
pub const DEFAULT_CONFIG_VERSION: &str = "align_config_v1";
