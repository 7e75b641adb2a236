//! Core types for the consensus kernel.

pub mod aligned;
pub mod confidence;
pub mod draft;
pub mod report;

pub use aligned::{
    AlignedBlock, AlignedSequence, AlignedToken, AlignmentMethod, AlignmentShapeError,
};
pub use confidence::{
    BlockConfidence, ColumnAgreement, ConfidenceColumn, ConfidenceLevel, Difference,
    DifferenceCategory, DifferenceRecord,
};
pub use draft::{validate_drafts, Block, BlockId, Draft, DraftId, ValidationError};
pub use report::{AlignmentRun, BlockResult, RunSummary};
