//! Consensus synthesis from aligned blocks.
//!
//! Produces one merged token stream per block (one output token per
//! alignment column, gap columns skipped), joined into block text.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{AlignedBlock, AlignedToken, BlockConfidence};

/// Strategy for picking the consensus token at each column.
///
/// A closed set: adding a strategy means adding a variant and a handler,
/// and the compiler checks the match stays exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusStrategy {
    /// Prefer the column's already-computed most-frequent non-gap token;
    /// fall back to the first non-gap token present.
    HighestConfidence,
    /// Plurality vote among non-gap tokens at the column.
    MajorityVote,
    /// Always the reference (first) draft's token, even when it is a
    /// minority reading.
    FirstDraft,
}

impl ConsensusStrategy {
    /// Parse a strategy name. Unrecognized names behave as majority vote.
    pub fn parse(name: &str) -> Self {
        match name {
            "highest_confidence" => Self::HighestConfidence,
            "majority_vote" => Self::MajorityVote,
            "first_draft" => Self::FirstDraft,
            _ => Self::MajorityVote,
        }
    }
}

impl Default for ConsensusStrategy {
    fn default() -> Self {
        Self::MajorityVote
    }
}

impl fmt::Display for ConsensusStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighestConfidence => write!(f, "highest_confidence"),
            Self::MajorityVote => write!(f, "majority_vote"),
            Self::FirstDraft => write!(f, "first_draft"),
        }
    }
}

/// Synthesize one block's consensus tokens under a strategy.
pub fn consensus_tokens(
    block: &AlignedBlock,
    confidence: &BlockConfidence,
    strategy: ConsensusStrategy,
) -> Vec<String> {
    let mut tokens = Vec::with_capacity(block.alignment_length);
    for position in 0..block.alignment_length {
        let column = block.column(position);
        let picked = match strategy {
            ConsensusStrategy::HighestConfidence => confidence
                .columns
                .get(position)
                .and_then(|c| c.agreement.leading_token.clone())
                .or_else(|| first_non_gap(&column)),
            ConsensusStrategy::MajorityVote => plurality(&column),
            ConsensusStrategy::FirstDraft => column
                .first()
                .and_then(|t| t.as_token())
                .map(str::to_string),
        };
        if let Some(token) = picked {
            tokens.push(token);
        }
    }
    tokens
}

/// Consensus text for one block: tokens joined with single spaces.
pub fn consensus_text(
    block: &AlignedBlock,
    confidence: &BlockConfidence,
    strategy: ConsensusStrategy,
) -> String {
    consensus_tokens(block, confidence, strategy).join(" ")
}

/// Join block consensus texts into the consensus document, in block order.
pub fn consensus_document(block_texts: &[String]) -> String {
    block_texts
        .iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn first_non_gap(column: &[&AlignedToken]) -> Option<String> {
    column
        .iter()
        .find_map(|t| t.as_token())
        .map(str::to_string)
}

/// Plurality among non-gap tokens, ties to the first-seen token.
fn plurality(column: &[&AlignedToken]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for token in column.iter().filter_map(|t| t.as_token()) {
        match counts.iter_mut().find(|(t, _)| *t == token) {
            Some((_, n)) => *n += 1,
            None => counts.push((token, 1)),
        }
    }
    let mut winner: Option<(&str, usize)> = None;
    for &(token, n) in &counts {
        if winner.map_or(true, |(_, best)| n > best) {
            winner = Some((token, n));
        }
    }
    winner.map(|(t, _)| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlignmentConfig;
    use crate::confidence::ConfidenceScorer;
    use crate::types::{AlignedSequence, AlignmentMethod, BlockId, DraftId};

    fn block_from_rows(rows: &[(&str, &[&str])]) -> AlignedBlock {
        let sequences = rows
            .iter()
            .map(|(draft, cells)| {
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
                AlignedSequence::from_tokens(DraftId::new(*draft), tokens)
            })
            .collect();
        AlignedBlock::new(
            BlockId::new("b1"),
            sequences,
            AlignmentMethod::ReferencePairwise,
        )
        .unwrap()
    }

    fn text(block: &AlignedBlock, strategy: ConsensusStrategy) -> String {
        let confidence = ConfidenceScorer::new(&AlignmentConfig::default()).score_block(block);
        consensus_text(block, &confidence, strategy)
    }

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!(
            ConsensusStrategy::parse("first_draft"),
            ConsensusStrategy::FirstDraft
        );
        assert_eq!(
            ConsensusStrategy::parse("anything_else"),
            ConsensusStrategy::MajorityVote
        );
    }

    #[test]
    fn test_majority_vote_picks_two_of_three() {
        let block = block_from_rows(&[
            ("d1", &["the", "widow"]),
            ("d2", &["the", "window"]),
            ("d3", &["the", "widow"]),
        ]);
        assert_eq!(text(&block, ConsensusStrategy::MajorityVote), "the widow");
    }

    #[test]
    fn test_first_draft_keeps_minority_reading() {
        let block = block_from_rows(&[
            ("d1", &["window"]),
            ("d2", &["widow"]),
            ("d3", &["widow"]),
        ]);
        assert_eq!(text(&block, ConsensusStrategy::FirstDraft), "window");
    }

    #[test]
    fn test_first_draft_skips_its_gaps() {
        let block = block_from_rows(&[
            ("d1", &["north", "-"]),
            ("d2", &["north", "east"]),
        ]);
        assert_eq!(text(&block, ConsensusStrategy::FirstDraft), "north");
    }

    #[test]
    fn test_highest_confidence_uses_leading_token() {
        let block = block_from_rows(&[
            ("d1", &["n", "37", "w"]),
            ("d2", &["n", "3", "w"]),
            ("d3", &["n", "37", "w"]),
        ]);
        assert_eq!(
            text(&block, ConsensusStrategy::HighestConfidence),
            "n 37 w"
        );
    }

    #[test]
    fn test_gap_columns_are_skipped() {
        let block = block_from_rows(&[
            ("d1", &["north", "east"]),
            ("d2", &["north", "-"]),
        ]);
        assert_eq!(text(&block, ConsensusStrategy::MajorityVote), "north east");
    }

    #[test]
    fn test_consensus_document_joins_blocks() {
        let doc = consensus_document(&[
            "first block".to_string(),
            String::new(),
            "third block".to_string(),
        ]);
        assert_eq!(doc, "first block\n\nthird block");
    }
}
