//! Draft and block input types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::canonical::compute_content_hash;

/// Identifier for one transcription attempt of a source document.
///
/// Wraps the external string id and implements `Ord` for deterministic
/// ordering wherever drafts are collected into sets or maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DraftId(String);

impl DraftId {
    /// Create a new DraftId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DraftId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DraftId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier for a titled subdivision of a draft.
///
/// Blocks are compared only against same-id blocks of other drafts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    /// Create a new BlockId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One titled subdivision of a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block identifier, shared across drafts.
    pub id: BlockId,
    /// Raw transcription text for this block.
    pub text: String,
}

impl Block {
    /// Create a new block.
    pub fn new(id: impl Into<BlockId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// One complete transcription attempt of a source document.
///
/// Immutable once ingested: the engine never mutates drafts, it only
/// reads them into per-run working structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    /// Draft identifier.
    pub draft_id: DraftId,
    /// Ordered blocks of this draft.
    pub blocks: Vec<Block>,
}

impl Draft {
    /// Create a new draft.
    pub fn new(draft_id: impl Into<DraftId>, blocks: Vec<Block>) -> Self {
        Self {
            draft_id: draft_id.into(),
            blocks,
        }
    }

    /// SHA-256 content hash over all block texts, in block order.
    ///
    /// Stable across newline-style and edge-whitespace differences, so
    /// external stores can use it to detect drift between the text that
    /// was aligned and the text they hold.
    pub fn content_hash(&self) -> String {
        let joined = self
            .blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        compute_content_hash(&joined)
    }
}

/// Error for malformed alignment input, rejected before processing begins.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    /// Fewer than two drafts were supplied.
    #[error("Alignment requires at least 2 drafts, got {0}")]
    TooFewDrafts(usize),
    /// A draft id is empty.
    #[error("Draft at index {0} has an empty draft_id")]
    EmptyDraftId(usize),
    /// Two drafts share the same id.
    #[error("Duplicate draft_id: {0}")]
    DuplicateDraftId(DraftId),
    /// A block id is empty.
    #[error("Draft {draft_id} has a block with an empty id")]
    EmptyBlockId {
        /// The draft containing the offending block.
        draft_id: DraftId,
    },
    /// One draft contains the same block id twice.
    #[error("Draft {draft_id} repeats block id {block_id}")]
    DuplicateBlockId {
        /// The draft containing the repeated block.
        draft_id: DraftId,
        /// The repeated block id.
        block_id: BlockId,
    },
}

/// Validate a collection of drafts against the input contract.
///
/// Checks: at least 2 drafts, non-empty unique draft ids, non-empty
/// block ids, no repeated block id within one draft. Text is allowed to
/// be empty; an empty block simply tokenizes to nothing.
pub fn validate_drafts(drafts: &[Draft]) -> Result<(), ValidationError> {
    if drafts.len() < 2 {
        return Err(ValidationError::TooFewDrafts(drafts.len()));
    }

    let mut seen_drafts: BTreeSet<&str> = BTreeSet::new();
    for (i, draft) in drafts.iter().enumerate() {
        if draft.draft_id.as_str().is_empty() {
            return Err(ValidationError::EmptyDraftId(i));
        }
        if !seen_drafts.insert(draft.draft_id.as_str()) {
            return Err(ValidationError::DuplicateDraftId(draft.draft_id.clone()));
        }

        let mut seen_blocks: BTreeSet<&str> = BTreeSet::new();
        for block in &draft.blocks {
            if block.id.as_str().is_empty() {
                return Err(ValidationError::EmptyBlockId {
                    draft_id: draft.draft_id.clone(),
                });
            }
            if !seen_blocks.insert(block.id.as_str()) {
                return Err(ValidationError::DuplicateBlockId {
                    draft_id: draft.draft_id.clone(),
                    block_id: block.id.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_good_drafts() -> Vec<Draft> {
        vec![
            Draft::new("d1", vec![Block::new("b1", "the cat sat")]),
            Draft::new("d2", vec![Block::new("b1", "the cat sat")]),
        ]
    }

    #[test]
    fn test_validate_accepts_two_drafts() {
        assert!(validate_drafts(&two_good_drafts()).is_ok());
    }

    #[test]
    fn test_validate_rejects_single_draft() {
        let drafts = vec![Draft::new("d1", vec![])];
        assert!(matches!(
            validate_drafts(&drafts),
            Err(ValidationError::TooFewDrafts(1))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_draft_id() {
        let mut drafts = two_good_drafts();
        drafts[1].draft_id = DraftId::new("d1");
        assert!(matches!(
            validate_drafts(&drafts),
            Err(ValidationError::DuplicateDraftId(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_block_id() {
        let mut drafts = two_good_drafts();
        drafts[0].blocks[0].id = BlockId::new("");
        assert!(matches!(
            validate_drafts(&drafts),
            Err(ValidationError::EmptyBlockId { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_repeated_block_id() {
        let mut drafts = two_good_drafts();
        drafts[0].blocks.push(Block::new("b1", "again"));
        assert!(matches!(
            validate_drafts(&drafts),
            Err(ValidationError::DuplicateBlockId { .. })
        ));
    }

    #[test]
    fn test_content_hash_stable_across_newline_style() {
        let a = Draft::new("d1", vec![Block::new("b1", "line one\r\nline two")]);
        let b = Draft::new("d1", vec![Block::new("b1", "line one\nline two")]);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_draft_id_ordering() {
        assert!(DraftId::new("a") < DraftId::new("b"));
    }
}
