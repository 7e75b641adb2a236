//! Consistency alignment of per-draft token sequences.
//!
//! The aligner turns one block's per-draft normalized token sequences
//! into a common-length, gap-padded representation.
//!
//! ## Algorithm
//!
//! 1. Fast path: all sequences element-wise identical → return them
//!    unchanged (identity alignment, no computation).
//! 2. General path: the first draft is the reference. Every other
//!    sequence is aligned to the reference independently with an
//!    affine-gap global DP (Gotoh), projected onto reference coordinates,
//!    and all rows are right-padded with gaps to the maximum length.
//! 3. Degraded fallback: if the general path fails internally, every
//!    sequence is naively padded with trailing gaps to the longest
//!    sequence's length and the block is marked degraded. A failed block
//!    never aborts the run.
//!
//! ## Scoring
//!
//! Exact token match scores positive; tokens within edit distance 1
//! score a smaller positive value (single-character OCR slips align
//! rather than gap out); anything else scores negative. Opening a gap
//! costs more than extending one. Edit-distance checks are memoized in a
//! run-scoped LRU cache owned by the aligner instance, so alignment stays
//! a pure computation with no process-wide state.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::{debug, warn};

use crate::config::AlignmentConfig;
use crate::types::{
    AlignedBlock, AlignedSequence, AlignedToken, AlignmentMethod, AlignmentShapeError, BlockId,
    DraftId, ValidationError,
};

/// Internal alignment failure, recovered via the degraded fallback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AlignmentFailure {
    /// The DP matrix for a sequence pair exceeds the configured budget.
    #[error("Pairwise DP needs {needed} cells, budget is {budget}")]
    CellBudgetExceeded {
        /// Cells the pair would need.
        needed: usize,
        /// Configured budget.
        budget: usize,
    },
    /// Assembled rows violated the alignment invariants.
    #[error("Alignment shape violation: {0}")]
    Shape(#[from] AlignmentShapeError),
}

/// One step of a pairwise alignment, in reference/other orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairOp {
    /// Both sequences contribute a token (match or substitution).
    Both,
    /// The other sequence is silent against a reference token.
    GapOther,
    /// The other sequence inserts a token the reference lacks.
    GapRef,
}

/// Aligns the drafts of one block at a time.
///
/// Owns the run-scoped fuzzy-match cache; create one per run and drop it
/// with the run.
pub struct BlockAligner {
    config: AlignmentConfig,
    fuzzy_cache: LruCache<(String, String), bool>,
}

impl BlockAligner {
    /// Create an aligner for one run.
    pub fn new(config: AlignmentConfig) -> Self {
        let capacity = NonZeroUsize::new(config.fuzzy_cache_capacity.max(1))
            .expect("capacity is at least 1");
        Self {
            config,
            fuzzy_cache: LruCache::new(capacity),
        }
    }

    /// Align one block's sequences. Requires at least two drafts.
    ///
    /// Internal failures are recovered here: the caller always gets an
    /// aligned block back, possibly marked [`AlignmentMethod::Degraded`].
    pub fn align(
        &mut self,
        block_id: &BlockId,
        drafts: &[(DraftId, Vec<String>)],
    ) -> Result<AlignedBlock, ValidationError> {
        if drafts.len() < 2 {
            return Err(ValidationError::TooFewDrafts(drafts.len()));
        }

        // Fast path: element-wise identical sequences need no computation.
        if drafts.iter().all(|(_, tokens)| tokens == &drafts[0].1) {
            let rows = drafts
                .iter()
                .map(|(draft_id, tokens)| {
                    AlignedSequence::from_tokens(
                        draft_id.clone(),
                        tokens.iter().map(AlignedToken::token).collect(),
                    )
                })
                .collect();
            let block = AlignedBlock::new(block_id.clone(), rows, AlignmentMethod::Identical)
                .expect("identical rows share one length");
            return Ok(block);
        }

        match self.align_general(block_id, drafts) {
            Ok(block) => Ok(block),
            Err(failure) => {
                warn!(block = %block_id, error = %failure, "alignment failed, using degraded fallback");
                Ok(degraded_alignment(block_id, drafts))
            }
        }
    }

    /// General path: pairwise-align every non-reference draft to the
    /// reference, then right-pad to a shared length.
    fn align_general(
        &mut self,
        block_id: &BlockId,
        drafts: &[(DraftId, Vec<String>)],
    ) -> Result<AlignedBlock, AlignmentFailure> {
        let (token_to_id, id_to_token) = intern_tokens(drafts);
        let encoded: Vec<Vec<u32>> = drafts
            .iter()
            .map(|(_, tokens)| tokens.iter().map(|t| token_to_id[t.as_str()]).collect())
            .collect();

        let reference = &encoded[0];
        let mut rows: Vec<Vec<AlignedToken>> = Vec::with_capacity(drafts.len());
        rows.push(
            drafts[0]
                .1
                .iter()
                .map(AlignedToken::token)
                .collect::<Vec<_>>(),
        );

        for other in encoded.iter().skip(1) {
            let ops = self.pairwise(reference, other, &id_to_token)?;
            rows.push(project_onto_reference(other, &ops, &id_to_token));
        }

        // Right-pad every row to the longest projection.
        let alignment_length = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(alignment_length, AlignedToken::Gap);
        }

        let sequences = drafts
            .iter()
            .zip(rows)
            .map(|((draft_id, _), row)| AlignedSequence::from_tokens(draft_id.clone(), row))
            .collect();

        let block =
            AlignedBlock::new(block_id.clone(), sequences, AlignmentMethod::ReferencePairwise)?;
        debug!(
            block = %block_id,
            alignment_length = block.alignment_length,
            drafts = block.draft_count,
            "aligned block"
        );
        Ok(block)
    }

    /// Affine-gap global alignment (Gotoh) over interned token ids.
    ///
    /// Returns the op sequence in reference/other orientation. Traceback
    /// tie-breaking is fixed (diagonal, then gap-in-other, then
    /// gap-in-reference) so the result is deterministic.
    fn pairwise(
        &mut self,
        a: &[u32],
        b: &[u32],
        id_to_token: &[String],
    ) -> Result<Vec<PairOp>, AlignmentFailure> {
        let n = a.len();
        let m = b.len();
        let cells = (n + 1).saturating_mul(m + 1);
        if cells > self.config.max_dp_cells {
            return Err(AlignmentFailure::CellBudgetExceeded {
                needed: cells,
                budget: self.config.max_dp_cells,
            });
        }

        const NEG_INF: i64 = i64::MIN / 4;
        let open = self.config.gap_open_score as i64;
        let extend = self.config.gap_extend_score as i64;
        let width = m + 1;
        let idx = |i: usize, j: usize| i * width + j;

        // M: both consume; X: gap in b (reference token unmatched);
        // Y: gap in a (other-sequence insertion).
        let mut mat_m = vec![NEG_INF; cells];
        let mut mat_x = vec![NEG_INF; cells];
        let mut mat_y = vec![NEG_INF; cells];
        mat_m[idx(0, 0)] = 0;
        for i in 1..=n {
            mat_x[idx(i, 0)] = open + (i as i64 - 1) * extend;
        }
        for j in 1..=m {
            mat_y[idx(0, j)] = open + (j as i64 - 1) * extend;
        }

        for i in 1..=n {
            for j in 1..=m {
                let s = self.pair_score(a[i - 1], b[j - 1], id_to_token) as i64;
                let diag = idx(i - 1, j - 1);
                mat_m[idx(i, j)] = mat_m[diag].max(mat_x[diag]).max(mat_y[diag]) + s;

                let up = idx(i - 1, j);
                mat_x[idx(i, j)] = (mat_m[up] + open).max(mat_x[up] + extend);

                let left = idx(i, j - 1);
                mat_y[idx(i, j)] = (mat_m[left] + open).max(mat_y[left] + extend);
            }
        }

        // Traceback from the best-scoring end state.
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            M,
            X,
            Y,
        }
        let end = idx(n, m);
        let mut state = if mat_m[end] >= mat_x[end] && mat_m[end] >= mat_y[end] {
            State::M
        } else if mat_x[end] >= mat_y[end] {
            State::X
        } else {
            State::Y
        };

        let mut ops: Vec<PairOp> = Vec::with_capacity(n + m);
        let (mut i, mut j) = (n, m);
        while i > 0 || j > 0 {
            match state {
                State::M => {
                    if i == 0 || j == 0 {
                        // Only gap states can reach a border.
                        state = if i > 0 { State::X } else { State::Y };
                        continue;
                    }
                    ops.push(PairOp::Both);
                    let s = self.pair_score(a[i - 1], b[j - 1], id_to_token) as i64;
                    let target = mat_m[idx(i, j)] - s;
                    let diag = idx(i - 1, j - 1);
                    state = if mat_m[diag] == target {
                        State::M
                    } else if mat_x[diag] == target {
                        State::X
                    } else {
                        State::Y
                    };
                    i -= 1;
                    j -= 1;
                }
                State::X => {
                    if i == 0 {
                        state = State::Y;
                        continue;
                    }
                    ops.push(PairOp::GapOther);
                    let up = idx(i - 1, j);
                    state = if mat_m[up] + open == mat_x[idx(i, j)] {
                        State::M
                    } else {
                        State::X
                    };
                    i -= 1;
                }
                State::Y => {
                    if j == 0 {
                        state = State::X;
                        continue;
                    }
                    ops.push(PairOp::GapRef);
                    let left = idx(i, j - 1);
                    state = if mat_m[left] + open == mat_y[idx(i, j)] {
                        State::M
                    } else {
                        State::Y
                    };
                    j -= 1;
                }
            }
        }
        ops.reverse();
        Ok(ops)
    }

    /// Substitution score for a token pair.
    fn pair_score(&mut self, a: u32, b: u32, id_to_token: &[String]) -> i32 {
        if a == b {
            return self.config.match_score;
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let key = (
            id_to_token[lo as usize].clone(),
            id_to_token[hi as usize].clone(),
        );
        let fuzzy = match self.fuzzy_cache.get(&key) {
            Some(&hit) => hit,
            None => {
                let computed = within_edit_distance_one(&key.0, &key.1);
                self.fuzzy_cache.put(key, computed);
                computed
            }
        };
        if fuzzy {
            self.config.fuzzy_match_score
        } else {
            self.config.mismatch_score
        }
    }
}

/// Degraded fallback: pad every sequence with trailing gaps to the
/// longest sequence's length, with no optimization.
pub fn degraded_alignment(block_id: &BlockId, drafts: &[(DraftId, Vec<String>)]) -> AlignedBlock {
    let alignment_length = drafts.iter().map(|(_, t)| t.len()).max().unwrap_or(0);
    let sequences = drafts
        .iter()
        .map(|(draft_id, tokens)| {
            let mut row: Vec<AlignedToken> = tokens.iter().map(AlignedToken::token).collect();
            row.resize(alignment_length, AlignedToken::Gap);
            AlignedSequence::from_tokens(draft_id.clone(), row)
        })
        .collect();
    AlignedBlock::new(block_id.clone(), sequences, AlignmentMethod::Degraded)
        .expect("padded rows share one length")
}

/// Passthrough for a block present in only one draft.
pub fn single_draft_alignment(
    block_id: &BlockId,
    draft_id: &DraftId,
    tokens: &[String],
) -> AlignedBlock {
    let row = AlignedSequence::from_tokens(
        draft_id.clone(),
        tokens.iter().map(AlignedToken::token).collect(),
    );
    AlignedBlock::new(block_id.clone(), vec![row], AlignmentMethod::SingleDraft)
        .expect("single row is trivially consistent")
}

/// Intern every token appearing in any draft of the block.
///
/// Ids are assigned over the sorted unique token set so the encoding is
/// independent of draft order.
fn intern_tokens(drafts: &[(DraftId, Vec<String>)]) -> (BTreeMap<String, u32>, Vec<String>) {
    let unique: BTreeSet<&String> = drafts.iter().flat_map(|(_, tokens)| tokens).collect();
    let id_to_token: Vec<String> = unique.into_iter().cloned().collect();
    let token_to_id = id_to_token
        .iter()
        .enumerate()
        .map(|(i, token)| (token.clone(), i as u32))
        .collect();
    (token_to_id, id_to_token)
}

/// Project the other sequence of a pairwise alignment onto reference
/// coordinates.
///
/// Columns where the other draft is silent become gaps; insertions the
/// reference lacks stay in the projection and stretch it beyond the
/// reference length (resolved by right-padding at the block level).
fn project_onto_reference(
    other: &[u32],
    ops: &[PairOp],
    id_to_token: &[String],
) -> Vec<AlignedToken> {
    let mut projected = Vec::with_capacity(ops.len());
    let mut b = 0usize;
    for op in ops {
        match op {
            PairOp::Both | PairOp::GapRef => {
                projected.push(AlignedToken::token(id_to_token[other[b] as usize].clone()));
                b += 1;
            }
            PairOp::GapOther => projected.push(AlignedToken::Gap),
        }
    }
    projected
}

/// Whether two distinct tokens are within Levenshtein distance 1.
fn within_edit_distance_one(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    match long.len() - short.len() {
        0 => {
            // Exactly one substitution.
            short.iter().zip(long.iter()).filter(|(x, y)| x != y).count() == 1
        }
        1 => {
            // One insertion into the shorter string.
            let mut i = 0;
            let mut j = 0;
            let mut skipped = false;
            while i < short.len() && j < long.len() {
                if short[i] == long[j] {
                    i += 1;
                    j += 1;
                } else if skipped {
                    return false;
                } else {
                    skipped = true;
                    j += 1;
                }
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn cells(block: &AlignedBlock) -> Vec<Vec<String>> {
        block
            .aligned_sequences
            .iter()
            .map(|s| s.tokens.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_edit_distance_one() {
        assert!(within_edit_distance_one("widow", "window"));
        assert!(within_edit_distance_one("37", "3"));
        assert!(within_edit_distance_one("cat", "cap"));
        assert!(!within_edit_distance_one("cat", "dog"));
        assert!(!within_edit_distance_one("north", "south"));
    }

    #[test]
    fn test_fast_path_identity() {
        let mut aligner = BlockAligner::new(AlignmentConfig::default());
        let drafts = vec![
            (DraftId::new("d1"), toks(&["the", "cat", "sat"])),
            (DraftId::new("d2"), toks(&["the", "cat", "sat"])),
            (DraftId::new("d3"), toks(&["the", "cat", "sat"])),
        ];
        let block = aligner.align(&BlockId::new("b1"), &drafts).unwrap();
        assert_eq!(block.method, AlignmentMethod::Identical);
        assert_eq!(block.alignment_length, 3);
        for seq in &block.aligned_sequences {
            assert_eq!(seq.original_to_alignment, vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_rejects_single_draft() {
        let mut aligner = BlockAligner::new(AlignmentConfig::default());
        let drafts = vec![(DraftId::new("d1"), toks(&["alone"]))];
        assert!(matches!(
            aligner.align(&BlockId::new("b1"), &drafts),
            Err(ValidationError::TooFewDrafts(1))
        ));
    }

    #[test]
    fn test_substitution_stays_columnar() {
        let mut aligner = BlockAligner::new(AlignmentConfig::default());
        let drafts = vec![
            (DraftId::new("d1"), toks(&["a", "widow", "here"])),
            (DraftId::new("d2"), toks(&["a", "window", "here"])),
        ];
        let block = aligner.align(&BlockId::new("b1"), &drafts).unwrap();
        assert_eq!(block.method, AlignmentMethod::ReferencePairwise);
        assert_eq!(block.alignment_length, 3);
        let rows = cells(&block);
        assert_eq!(rows[0], vec!["a", "widow", "here"]);
        assert_eq!(rows[1], vec!["a", "window", "here"]);
    }

    #[test]
    fn test_missing_trailing_token_becomes_gap() {
        let mut aligner = BlockAligner::new(AlignmentConfig::default());
        let drafts = vec![
            (DraftId::new("d1"), toks(&["north", "east"])),
            (DraftId::new("d2"), toks(&["north"])),
        ];
        let block = aligner.align(&BlockId::new("b1"), &drafts).unwrap();
        assert_eq!(block.alignment_length, 2);
        let rows = cells(&block);
        assert_eq!(rows[1], vec!["north", "-"]);
        assert_eq!(block.aligned_sequences[1].original_to_alignment, vec![0]);
    }

    #[test]
    fn test_internal_deletion_becomes_gap() {
        let mut aligner = BlockAligner::new(AlignmentConfig::default());
        let drafts = vec![
            (
                DraftId::new("d1"),
                toks(&["beginning", "at", "a", "point", "thence", "south"]),
            ),
            (
                DraftId::new("d2"),
                toks(&["beginning", "at", "point", "thence", "south"]),
            ),
        ];
        let block = aligner.align(&BlockId::new("b1"), &drafts).unwrap();
        assert_eq!(block.alignment_length, 6);
        let rows = cells(&block);
        assert_eq!(rows[1], vec!["beginning", "at", "-", "point", "thence", "south"]);
    }

    #[test]
    fn test_fuzzy_match_aligns_ocr_slip() {
        let mut aligner = BlockAligner::new(AlignmentConfig::default());
        // "37" vs "3" is edit distance 1 and should pair up, not gap out.
        let drafts = vec![
            (DraftId::new("d1"), toks(&["n", "37", "00", "w"])),
            (DraftId::new("d2"), toks(&["n", "3", "00", "w"])),
        ];
        let block = aligner.align(&BlockId::new("b1"), &drafts).unwrap();
        assert_eq!(block.alignment_length, 4);
        let rows = cells(&block);
        assert_eq!(rows[1], vec!["n", "3", "00", "w"]);
    }

    #[test]
    fn test_cell_budget_degrades() {
        let mut config = AlignmentConfig::default();
        config.max_dp_cells = 4;
        let mut aligner = BlockAligner::new(config);
        let drafts = vec![
            (DraftId::new("d1"), toks(&["a", "b", "c"])),
            (DraftId::new("d2"), toks(&["a", "c"])),
        ];
        let block = aligner.align(&BlockId::new("b1"), &drafts).unwrap();
        assert_eq!(block.method, AlignmentMethod::Degraded);
        assert_eq!(block.alignment_length, 3);
        let rows = cells(&block);
        assert_eq!(rows[1], vec!["a", "c", "-"]);
    }

    #[test]
    fn test_degraded_preserves_order_and_pads() {
        let drafts = vec![
            (DraftId::new("d1"), toks(&["a", "b", "c"])),
            (DraftId::new("d2"), toks(&["a"])),
        ];
        let block = degraded_alignment(&BlockId::new("b1"), &drafts);
        assert_eq!(block.alignment_length, 3);
        assert_eq!(block.aligned_sequences[1].non_gap_count(), 1);
    }

    #[test]
    fn test_single_draft_passthrough() {
        let block = single_draft_alignment(
            &BlockId::new("b1"),
            &DraftId::new("d1"),
            &toks(&["only", "one"]),
        );
        assert_eq!(block.method, AlignmentMethod::SingleDraft);
        assert_eq!(block.alignment_length, 2);
        assert_eq!(block.draft_count, 1);
    }

    #[test]
    fn test_alignment_is_deterministic() {
        let drafts = vec![
            (DraftId::new("d1"), toks(&["the", "cat", "sat", "down"])),
            (DraftId::new("d2"), toks(&["the", "cap", "sat"])),
            (DraftId::new("d3"), toks(&["the", "cat", "down"])),
        ];
        let mut first: Option<Vec<Vec<String>>> = None;
        for _ in 0..20 {
            let mut aligner = BlockAligner::new(AlignmentConfig::default());
            let block = aligner.align(&BlockId::new("b1"), &drafts).unwrap();
            let rows = cells(&block);
            match &first {
                None => first = Some(rows),
                Some(expected) => assert_eq!(expected, &rows),
            }
        }
    }
}
