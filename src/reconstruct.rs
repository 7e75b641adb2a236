//! Format-faithful reconstruction of aligned token rows.
//!
//! Renders one draft's aligned, normalized tokens back as display text
//! matching the draft's original formatting. Normalized tokens are not
//! 1:1 with original substrings (one bearing decomposes into several
//! tokens, pure punctuation contributes none), so reconstruction works
//! from claimed spans plus a best-effort repair pass:
//!
//! 1. **Span claiming**: candidate spans (one per raw substring) are
//!    sorted by the number of normalized tokens they consume, longest
//!    first, and greedily claim normalized-index ranges; a span whose
//!    range overlaps an already-claimed one is skipped.
//! 2. **Repair rules**: tokens left unmapped are re-formatted from their
//!    immediate neighbors via the ordered [`REPAIR_RULES`] table. The
//!    rules are guesswork over ambiguous token streams; each is named,
//!    individually testable, and backed by a raw-token fallback.
//! 3. **Spacing**: between two claimed spans the rendered whitespace is
//!    the verbatim original text between them, never a synthesized
//!    single space.
//! 4. **Fail-safe**: if the pass would represent more tokens than the
//!    row actually contains, the whole row reverts to its raw normalized
//!    tokens rather than emit corrupted text.

use tracing::warn;

use crate::format_map::{FormatMapping, SpanGroup};
use crate::types::AlignedSequence;

/// Duplication detected while reconstructing one draft/block.
///
/// Non-fatal: the caller logs it and falls back to raw tokens.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Reconstruction for draft {draft_id} would represent {represented} tokens, expected at most {expected}"
)]
pub struct ReconstructionMismatch {
    /// The draft being reconstructed.
    pub draft_id: String,
    /// Token units the pieces claim to represent.
    pub represented: usize,
    /// Non-gap tokens actually present in the row.
    pub expected: usize,
}

/// Neighborhood of an unmapped token handed to repair rules.
///
/// `prev` and `next` are the adjacent normalized tokens in the draft's
/// original order, regardless of whether those neighbors are themselves
/// mapped.
#[derive(Debug, Clone, Copy)]
pub struct RepairContext<'a> {
    /// The unmapped normalized token.
    pub token: &'a str,
    /// Preceding normalized token, if any.
    pub prev: Option<&'a str>,
    /// Following normalized token, if any.
    pub next: Option<&'a str>,
}

/// A repair rule's output.
#[derive(Debug, Clone)]
pub struct Repair {
    /// Display text for the token (and possibly its follow-on).
    pub text: String,
    /// Whether the follow-on token was folded in and must be consumed
    /// exactly once.
    pub consume_next: bool,
}

/// One named formatting-repair rule.
#[derive(Debug, Clone, Copy)]
pub struct RepairRule {
    /// Rule name, for diagnostics.
    pub name: &'static str,
    /// The rule body.
    pub apply: fn(&RepairContext<'_>) -> Option<Repair>,
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_direction(s: &str) -> bool {
    matches!(s, "n" | "s" | "e" | "w")
}

const TENS_WORDS: [&str; 8] = [
    "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const UNIT_WORDS: [&str; 9] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

/// A digit run flanked by direction letters reads as a bearing's degree
/// figure: `n 4 w` renders the 4 as `4°`.
fn repair_degree_mark(ctx: &RepairContext<'_>) -> Option<Repair> {
    if is_digits(ctx.token)
        && ctx.prev.is_some_and(is_direction)
        && ctx.next.is_some_and(is_direction)
    {
        return Some(Repair {
            text: format!("{}°", ctx.token),
            consume_next: false,
        });
    }
    None
}

/// A lone digit wedged between two digit runs reads as the integer part
/// of a decimal that was split from its following fraction digit:
/// `180 1 4` renders the middle pair as `1.4`.
fn repair_split_decimal(ctx: &RepairContext<'_>) -> Option<Repair> {
    let next = ctx.next?;
    if ctx.token.len() == 1
        && is_digits(ctx.token)
        && is_digits(next)
        && next.len() == 1
        && ctx.prev.is_some_and(is_digits)
    {
        return Some(Repair {
            text: format!("{}.{}", ctx.token, next),
            consume_next: true,
        });
    }
    None
}

/// Adjacent word-form number fragments hyphen-join: `seventy four`
/// renders as `seventy-four`, the follow-on consumed exactly once.
fn repair_word_number(ctx: &RepairContext<'_>) -> Option<Repair> {
    let next = ctx.next?;
    if TENS_WORDS.contains(&ctx.token) && UNIT_WORDS.contains(&next) {
        return Some(Repair {
            text: format!("{}-{}", ctx.token, next),
            consume_next: true,
        });
    }
    None
}

/// Digit runs of thousands length get their separator back:
/// `1638` renders as `1,638`.
fn repair_thousands_separator(ctx: &RepairContext<'_>) -> Option<Repair> {
    if is_digits(ctx.token) && (4..=6).contains(&ctx.token.len()) {
        let split = ctx.token.len() - 3;
        return Some(Repair {
            text: format!("{},{}", &ctx.token[..split], &ctx.token[split..]),
            consume_next: false,
        });
    }
    None
}

/// The default repair table, applied in order; first match wins.
pub const REPAIR_RULES: &[RepairRule] = &[
    RepairRule {
        name: "degree_mark",
        apply: repair_degree_mark,
    },
    RepairRule {
        name: "split_decimal",
        apply: repair_split_decimal,
    },
    RepairRule {
        name: "word_number",
        apply: repair_word_number,
    },
    RepairRule {
        name: "thousands_separator",
        apply: repair_thousands_separator,
    },
];

/// One emitted display fragment.
enum Piece {
    /// A claimed span, rendered with its original text and offsets.
    Span { start: usize, end: usize, text: String },
    /// Repaired or raw text with no original span.
    Loose { text: String },
}

/// Reconstructs display text for aligned rows of one draft/block.
pub struct FormatReconstructor {
    rules: &'static [RepairRule],
}

impl Default for FormatReconstructor {
    fn default() -> Self {
        Self {
            rules: REPAIR_RULES,
        }
    }
}

impl FormatReconstructor {
    /// Reconstructor with the default rule table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstructor with a custom rule table.
    pub fn with_rules(rules: &'static [RepairRule]) -> Self {
        Self { rules }
    }

    /// Render a draft's aligned row with its original formatting.
    ///
    /// Never fails: a [`ReconstructionMismatch`] is logged and the row
    /// falls back to its raw normalized tokens.
    pub fn reconstruct(&self, sequence: &AlignedSequence, mapping: &FormatMapping) -> String {
        match self.try_reconstruct(sequence, mapping) {
            Ok(text) => text,
            Err(mismatch) => {
                warn!(error = %mismatch, "reconstruction mismatch, reverting to raw tokens");
                raw_fallback(sequence)
            }
        }
    }

    /// Render a draft's aligned row, surfacing duplication as an error.
    pub fn try_reconstruct(
        &self,
        sequence: &AlignedSequence,
        mapping: &FormatMapping,
    ) -> Result<String, ReconstructionMismatch> {
        // Non-gap cells in alignment order; cell rank == original index.
        let cells: Vec<&str> = sequence
            .tokens
            .iter()
            .filter_map(|t| t.as_token())
            .collect();
        let expected = cells.len();
        if expected == 0 {
            return Ok(String::new());
        }

        let (groups, claims) = claim_spans(mapping, expected);

        // The draft's normalized tokens per the mapping, used as the
        // repair-rule neighborhood and to detect edited cells.
        let normalized: Vec<Option<&str>> = (0..expected)
            .map(|i| {
                mapping
                    .position_for_token(i)
                    .map(|p| p.normalized_text.as_str())
            })
            .collect();

        // `represented` counts emitted display words. A span or a merge
        // may legitimately represent several normalized tokens with one
        // word (fewer is fine); emitting more words than the row holds
        // non-gap tokens is the duplication signal.
        let mut pieces: Vec<Piece> = Vec::new();
        let mut represented = 0usize;
        let mut idx = 0usize;
        while idx < expected {
            if let Some(gi) = claims[idx] {
                let group = &groups[gi];
                let range_end = group.last_index.min(expected - 1);
                let unedited = (idx..=range_end)
                    .all(|i| normalized[i].is_some_and(|n| n == cells[i]));
                if unedited {
                    represented += group.original_text.split_whitespace().count();
                    pieces.push(Piece::Span {
                        start: group.start_char,
                        end: group.end_char,
                        text: group.original_text.clone(),
                    });
                } else {
                    // Edited cells lose their claim and render raw.
                    for i in idx..=range_end {
                        pieces.push(Piece::Loose {
                            text: cells[i].to_string(),
                        });
                        represented += 1;
                    }
                }
                idx = range_end + 1;
                continue;
            }

            // Unmapped: try the repair table, then fall back to the raw
            // normalized token.
            let ctx = RepairContext {
                token: cells[idx],
                prev: idx.checked_sub(1).map(|i| cells[i]),
                next: cells.get(idx + 1).copied(),
            };
            let mut applied = false;
            for rule in self.rules {
                if let Some(repair) = (rule.apply)(&ctx) {
                    if repair.consume_next {
                        // The follow-on is folded in exactly once; a rule
                        // may not consume a token another span owns.
                        let next_free = idx + 1 < expected && claims[idx + 1].is_none();
                        if !next_free {
                            continue;
                        }
                        represented += repair.text.split_whitespace().count().max(1);
                        pieces.push(Piece::Loose { text: repair.text });
                        idx += 2;
                    } else {
                        represented += repair.text.split_whitespace().count().max(1);
                        pieces.push(Piece::Loose { text: repair.text });
                        idx += 1;
                    }
                    applied = true;
                    break;
                }
            }
            if !applied {
                pieces.push(Piece::Loose {
                    text: cells[idx].to_string(),
                });
                represented += 1;
                idx += 1;
            }
        }

        if represented > expected {
            return Err(ReconstructionMismatch {
                draft_id: sequence.draft_id.to_string(),
                represented,
                expected,
            });
        }

        Ok(render(&pieces, &mapping.original_text))
    }
}

/// Raw fallback: the row's non-gap normalized tokens, space-joined.
pub fn raw_fallback(sequence: &AlignedSequence) -> String {
    sequence
        .tokens
        .iter()
        .filter_map(|t| t.as_token())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the conflict-free index→span claim table.
///
/// Candidates are sorted by consumed-token count descending (start index
/// ascending on ties) and claim greedily; a candidate overlapping an
/// already-claimed range is skipped, so longer, more specific spans win.
fn claim_spans(
    mapping: &FormatMapping,
    token_count: usize,
) -> (Vec<SpanGroup>, Vec<Option<usize>>) {
    let groups = mapping.span_groups();
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by(|&a, &b| {
        groups[b]
            .token_count()
            .cmp(&groups[a].token_count())
            .then(groups[a].first_index.cmp(&groups[b].first_index))
    });

    let mut claims: Vec<Option<usize>> = vec![None; token_count];
    for gi in order {
        let group = &groups[gi];
        if group.first_index >= token_count {
            continue;
        }
        let end = group.last_index.min(token_count - 1);
        if (group.first_index..=end).any(|i| claims[i].is_some()) {
            continue;
        }
        for i in group.first_index..=end {
            claims[i] = Some(gi);
        }
    }

    (groups, claims)
}

/// Join pieces, taking inter-span whitespace verbatim from the original.
///
/// The verbatim slice is used only when it is pure whitespace: a dropped
/// punctuation-only raw token may sit between two spans, and it must not
/// ride back in through the spacing.
fn render(pieces: &[Piece], original_text: &str) -> String {
    let mut out = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 {
            let gap = match (&pieces[i - 1], piece) {
                (Piece::Span { end, .. }, Piece::Span { start, .. }) if end <= start => {
                    Some(&original_text[*end..*start])
                }
                _ => None,
            };
            match gap {
                Some(g) if !g.is_empty() && g.chars().all(char::is_whitespace) => {
                    out.push_str(g)
                }
                _ => out.push(' '),
            }
        }
        match piece {
            Piece::Span { text, .. } | Piece::Loose { text } => out.push_str(text),
        }
    }
    out
}
