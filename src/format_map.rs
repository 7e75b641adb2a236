//! Format mapping: provenance of normalized tokens in original text.
//!
//! A [`FormatMapping`] ties every normalized token back to the exact byte
//! span of the raw substring it was derived from. One raw substring may
//! yield zero, one, or several normalized tokens (a bearing such as
//! `N.4°00'W.` decomposes into four), so several [`TokenPosition`]s may
//! share one span. Spans from distinct raw substrings never partially
//! overlap.

use serde::{Deserialize, Serialize};

use crate::types::DraftId;

/// One normalized token's provenance in the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPosition {
    /// Index of the token in the normalized token list.
    pub token_index: usize,
    /// Start byte offset of the source substring in the original text.
    pub start_char: usize,
    /// End byte offset (exclusive) of the source substring.
    pub end_char: usize,
    /// The source substring, formatting intact (e.g. `N.4°00'W.`).
    pub original_text: String,
    /// The normalized token (e.g. `4`).
    pub normalized_text: String,
}

/// Complete token-provenance mapping for one draft's block.
///
/// Built once during tokenization, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatMapping {
    /// The draft this mapping belongs to.
    pub draft_id: DraftId,
    /// The original block text.
    pub original_text: String,
    /// One entry per normalized token, in token order.
    pub token_positions: Vec<TokenPosition>,
}

impl FormatMapping {
    /// Position info for a specific normalized token index.
    pub fn position_for_token(&self, token_index: usize) -> Option<&TokenPosition> {
        // token_positions is ordered and dense in token_index, so direct
        // indexing works; fall back to search if a caller built a sparse map.
        match self.token_positions.get(token_index) {
            Some(pos) if pos.token_index == token_index => Some(pos),
            _ => self
                .token_positions
                .iter()
                .find(|p| p.token_index == token_index),
        }
    }

    /// Group positions into one [`SpanGroup`] per raw substring.
    ///
    /// Positions sharing an identical byte span belong to the same raw
    /// substring and are collapsed into a single group claiming the
    /// contiguous normalized-index range they cover.
    pub fn span_groups(&self) -> Vec<SpanGroup> {
        let mut groups: Vec<SpanGroup> = Vec::new();
        for pos in &self.token_positions {
            match groups.last_mut() {
                Some(last) if last.start_char == pos.start_char && last.end_char == pos.end_char => {
                    last.last_index = pos.token_index;
                }
                _ => groups.push(SpanGroup {
                    start_char: pos.start_char,
                    end_char: pos.end_char,
                    original_text: pos.original_text.clone(),
                    first_index: pos.token_index,
                    last_index: pos.token_index,
                }),
            }
        }
        groups
    }
}

/// One raw substring and the contiguous normalized-index range it yielded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanGroup {
    /// Start byte offset in the original text.
    pub start_char: usize,
    /// End byte offset (exclusive).
    pub end_char: usize,
    /// The raw substring, formatting intact.
    pub original_text: String,
    /// First normalized token index this substring yielded.
    pub first_index: usize,
    /// Last normalized token index this substring yielded.
    pub last_index: usize,
}

impl SpanGroup {
    /// Number of normalized tokens this substring consumes.
    pub fn token_count(&self) -> usize {
        self.last_index - self.first_index + 1
    }

    /// Whether this group's index range overlaps another's.
    pub fn overlaps(&self, other: &SpanGroup) -> bool {
        self.first_index <= other.last_index && other.first_index <= self.last_index
    }
}
