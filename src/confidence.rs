//! Per-column agreement scoring over aligned blocks.
//!
//! For every alignment column the scorer tallies the contributed token
//! (or gap) from each draft, computes an agreement score, bands it, and
//! flags the column as a difference when drafts disagree or are only
//! partially present.
//!
//! ## Scoring
//!
//! `score = count(most frequent non-gap token) / total draft count`.
//!
//! The denominator deliberately includes gap-contributing drafts: a token
//! missing from some drafts is penalized even if the drafts that do have
//! it agree perfectly. The all-gap column is the one carve-out: it is
//! scored 0.0 / low but is agreement, not a difference.

use tracing::debug;

use crate::config::AlignmentConfig;
use crate::types::{
    AlignedBlock, AlignedToken, BlockConfidence, ColumnAgreement, ConfidenceColumn,
    ConfidenceLevel, Difference, DifferenceCategory, DifferenceRecord,
};

/// Scores aligned blocks column by column.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    high_threshold: f64,
    medium_threshold: f64,
}

impl ConfidenceScorer {
    /// Create a scorer with the run's thresholds.
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            high_threshold: config.high_confidence_threshold,
            medium_threshold: config.medium_confidence_threshold,
        }
    }

    /// Score every column of a block and collect its differences.
    pub fn score_block(&self, block: &AlignedBlock) -> BlockConfidence {
        let mut columns = Vec::with_capacity(block.alignment_length);
        let mut differences = Vec::new();
        let mut level_counts = (0usize, 0usize, 0usize);
        let mut score_sum = 0.0;

        for position in 0..block.alignment_length {
            let tokens: Vec<AlignedToken> =
                block.column(position).into_iter().cloned().collect();
            let column = self.score_column(tokens);

            match column.level {
                ConfidenceLevel::High => level_counts.0 += 1,
                ConfidenceLevel::Medium => level_counts.1 += 1,
                ConfidenceLevel::Low => level_counts.2 += 1,
            }
            score_sum += column.score;

            if is_difference(&column.agreement) {
                differences.push(Difference {
                    position,
                    tokens: column.agreement.tokens.clone(),
                    confidence: column.score,
                    category: categorize(&column.agreement.tokens),
                });
            }
            columns.push(column);
        }

        let mean_score = if columns.is_empty() {
            0.0
        } else {
            score_sum / columns.len() as f64
        };

        debug!(
            block = %block.block_id,
            positions = columns.len(),
            differences = differences.len(),
            mean = mean_score,
            "scored block"
        );

        BlockConfidence {
            columns,
            differences,
            level_counts,
            mean_score,
        }
    }

    /// Score one column's tokens.
    fn score_column(&self, tokens: Vec<AlignedToken>) -> ConfidenceColumn {
        let total_drafts = tokens.len();

        // Tally non-gap tokens in draft order; ties resolve to the token
        // seen first, which keeps the result deterministic.
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for token in tokens.iter().filter_map(|t| t.as_token()) {
            match counts.iter_mut().find(|(t, _)| *t == token) {
                Some((_, n)) => *n += 1,
                None => counts.push((token, 1)),
            }
        }
        let non_gap_count: usize = counts.iter().map(|(_, n)| n).sum();
        let distinct_count = counts.len();
        // Keep the first-seen maximum: a later token must be strictly
        // more frequent to take the lead.
        let mut leading: Option<(&str, usize)> = None;
        for &(token, n) in &counts {
            if leading.map_or(true, |(_, best)| n > best) {
                leading = Some((token, n));
            }
        }
        let (leading_token, leading_count) = leading
            .map(|(t, n)| (Some(t.to_string()), n))
            .unwrap_or((None, 0));

        let agreement = ColumnAgreement {
            tokens,
            total_drafts,
            non_gap_count,
            distinct_count,
            leading_token,
            leading_count,
        };

        // All-gap columns carry no reading at all: score 0, level low,
        // but they are agreement, not disagreement.
        if agreement.is_all_gaps() {
            return ConfidenceColumn {
                score: 0.0,
                level: ConfidenceLevel::Low,
                agreement,
            };
        }

        // Perfect agreement: one distinct token, contributed by every draft.
        let score = if distinct_count == 1 && non_gap_count == total_drafts {
            1.0
        } else {
            leading_count as f64 / total_drafts as f64
        };

        let level = if score >= self.high_threshold {
            ConfidenceLevel::High
        } else if score >= self.medium_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };

        ConfidenceColumn {
            score,
            level,
            agreement,
        }
    }
}

/// A column is a difference when drafts disagree on the token, or when
/// only some drafts contribute one.
fn is_difference(agreement: &ColumnAgreement) -> bool {
    if agreement.is_all_gaps() {
        return false;
    }
    agreement.distinct_count > 1 || agreement.non_gap_count < agreement.total_drafts
}

/// Classify a difference. First matching rule wins.
fn categorize(tokens: &[AlignedToken]) -> DifferenceCategory {
    let non_gap: Vec<&str> = tokens.iter().filter_map(|t| t.as_token()).collect();
    if non_gap.is_empty() {
        return DifferenceCategory::Other;
    }

    let is_direction = |t: &str| {
        t.len() == 1
            && matches!(
                t.chars().next().map(|c| c.to_ascii_lowercase()),
                Some('n' | 's' | 'e' | 'w')
            )
    };
    if non_gap
        .iter()
        .any(|t| is_direction(t) || t.contains('°') || t.contains('.'))
    {
        return DifferenceCategory::Coordinate;
    }
    if non_gap
        .iter()
        .all(|t| t.chars().count() == 1 && !t.chars().next().is_some_and(char::is_alphanumeric))
    {
        return DifferenceCategory::Punctuation;
    }
    if non_gap
        .iter()
        .all(|t| !t.is_empty() && t.chars().all(char::is_alphabetic))
    {
        return DifferenceCategory::Word;
    }
    DifferenceCategory::Other
}

/// Surface a block's differences in reference-vs-alternatives form.
///
/// The reference is the first draft; a record is emitted only when at
/// least one other draft actually departs from it.
pub fn difference_records(block: &AlignedBlock, confidence: &BlockConfidence) -> Vec<DifferenceRecord> {
    let Some(reference_seq) = block.aligned_sequences.first() else {
        return Vec::new();
    };

    confidence
        .differences
        .iter()
        .filter_map(|diff| {
            let reference_token = diff.tokens[0].clone();
            let alternatives: Vec<_> = block
                .aligned_sequences
                .iter()
                .zip(&diff.tokens)
                .skip(1)
                .filter(|(_, token)| **token != reference_token)
                .map(|(seq, token)| (seq.draft_id.clone(), token.clone()))
                .collect();
            if alternatives.is_empty() {
                return None;
            }
            Some(DifferenceRecord {
                block_id: block.block_id.clone(),
                position: diff.position,
                reference_token,
                reference_draft: reference_seq.draft_id.clone(),
                alternatives,
                confidence: diff.confidence,
                category: diff.category,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(&AlignmentConfig::default())
    }

    #[test]
    fn test_perfect_agreement_scores_one() {
        let block = block_from_rows(&[
            ("d1", &["the", "cat", "sat"]),
            ("d2", &["the", "cat", "sat"]),
            ("d3", &["the", "cat", "sat"]),
        ]);
        let confidence = scorer().score_block(&block);
        assert_eq!(confidence.scores(), vec![1.0, 1.0, 1.0]);
        assert!(confidence
            .levels()
            .iter()
            .all(|l| *l == ConfidenceLevel::High));
        assert!(confidence.differences.is_empty());
    }

    #[test]
    fn test_two_way_split_scores_half() {
        let block = block_from_rows(&[("d1", &["widow"]), ("d2", &["window"])]);
        let confidence = scorer().score_block(&block);
        assert_eq!(confidence.scores(), vec![0.5]);
        assert_eq!(confidence.levels(), vec![ConfidenceLevel::Medium]);
        assert_eq!(confidence.differences.len(), 1);
        assert_eq!(
            confidence.differences[0].category,
            DifferenceCategory::Word
        );
    }

    #[test]
    fn test_gap_mixture_is_difference() {
        let block = block_from_rows(&[("d1", &["north", "east"]), ("d2", &["north", "-"])]);
        let confidence = scorer().score_block(&block);
        assert_eq!(confidence.differences.len(), 1);
        assert_eq!(confidence.differences[0].position, 1);
        // One token over two drafts: the missing draft drags the score down.
        assert_eq!(confidence.scores()[1], 0.5);
    }

    #[test]
    fn test_all_gap_column_is_not_a_difference() {
        let block = block_from_rows(&[("d1", &["a", "-"]), ("d2", &["a", "-"])]);
        let confidence = scorer().score_block(&block);
        assert!(confidence.differences.is_empty());
        assert_eq!(confidence.scores()[1], 0.0);
        assert_eq!(confidence.levels()[1], ConfidenceLevel::Low);
    }

    #[test]
    fn test_majority_with_gap_penalty() {
        // Three drafts agree, one is silent: 3/4, below the high band.
        let block = block_from_rows(&[
            ("d1", &["feet"]),
            ("d2", &["feet"]),
            ("d3", &["feet"]),
            ("d4", &["-"]),
        ]);
        let confidence = scorer().score_block(&block);
        assert_eq!(confidence.scores(), vec![0.75]);
        assert_eq!(confidence.levels(), vec![ConfidenceLevel::Medium]);
        assert_eq!(confidence.differences.len(), 1);
    }

    #[test]
    fn test_coordinate_category() {
        let block = block_from_rows(&[("d1", &["w"]), ("d2", &["e"])]);
        let confidence = scorer().score_block(&block);
        assert_eq!(
            confidence.differences[0].category,
            DifferenceCategory::Coordinate
        );

        let block = block_from_rows(&[("d1", &["1.4"]), ("d2", &["1.9"])]);
        let confidence = scorer().score_block(&block);
        assert_eq!(
            confidence.differences[0].category,
            DifferenceCategory::Coordinate
        );
    }

    #[test]
    fn test_punctuation_and_other_categories() {
        let block = block_from_rows(&[("d1", &[";"]), ("d2", &[","])]);
        let confidence = scorer().score_block(&block);
        assert_eq!(
            confidence.differences[0].category,
            DifferenceCategory::Punctuation
        );

        let block = block_from_rows(&[("d1", &["37"]), ("d2", &["38"])]);
        let confidence = scorer().score_block(&block);
        assert_eq!(
            confidence.differences[0].category,
            DifferenceCategory::Other
        );
    }

    #[test]
    fn test_tie_resolves_to_first_seen() {
        let block = block_from_rows(&[("d1", &["widow"]), ("d2", &["window"])]);
        let confidence = scorer().score_block(&block);
        assert_eq!(
            confidence.columns[0].agreement.leading_token.as_deref(),
            Some("widow")
        );
    }

    #[test]
    fn test_difference_records_reference_vs_alternatives() {
        let block = block_from_rows(&[
            ("d1", &["a", "widow"]),
            ("d2", &["a", "window"]),
            ("d3", &["a", "widow"]),
        ]);
        let confidence = scorer().score_block(&block);
        let records = difference_records(&block, &confidence);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.position, 1);
        assert_eq!(record.reference_draft, DraftId::new("d1"));
        assert_eq!(record.reference_token, AlignedToken::token("widow"));
        assert_eq!(record.alternatives.len(), 1);
        assert_eq!(record.alternatives[0].0, DraftId::new("d2"));
    }

    #[test]
    fn test_monotonicity_of_agreement() {
        let two = block_from_rows(&[("d1", &["feet"]), ("d2", &["feet"]), ("d3", &["foot"])]);
        let three = block_from_rows(&[
            ("d1", &["feet"]),
            ("d2", &["feet"]),
            ("d3", &["foot"]),
            ("d4", &["feet"]),
        ]);
        let s2 = scorer().score_block(&two).scores()[0];
        let s3 = scorer().score_block(&three).scores()[0];
        assert!(s3 >= s2);
    }
}
