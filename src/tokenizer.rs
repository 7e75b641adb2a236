//! Tokenization and format-mapping for deed transcription text.
//!
//! Splits a block's raw text into normalized tokens for alignment and
//! records, for every normalized token, the exact original byte span and
//! substring it was derived from.
//!
//! ## Normalization
//!
//! Applied per raw token (maximal non-whitespace run), yielding zero or
//! more normalized sub-tokens:
//!
//! 1. ASCII-lowercase
//! 2. Remove comma/whitespace runs separating two digits (`1,638` → `1638`)
//! 3. Protect a decimal point between two digits (`1.4` stays `1.4`)
//! 4. Replace every other non-alphanumeric character with a space
//! 5. Collapse whitespace and split
//!
//! A bearing like `N.4°00'W.` therefore decomposes into `n 4 00 w`; pure
//! punctuation such as `:-` yields nothing and is absent from the
//! mapping and must never be reinserted during reconstruction.
//!
//! ## Guarantee
//!
//! The sub-token counts over all raw tokens sum to exactly the normalized
//! token count for the draft/block, and every normalized token carries a
//! [`TokenPosition`].

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::format_map::{FormatMapping, TokenPosition};
use crate::types::DraftId;

/// A raw token's byte span in the block text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSpan {
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

/// Split text into maximal non-whitespace runs with byte offsets.
pub fn raw_spans(text: &str) -> Vec<RawSpan> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push(RawSpan { start: s, end: i });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push(RawSpan {
            start: s,
            end: text.len(),
        });
    }
    spans
}

/// Normalize one raw token into zero or more sub-tokens.
pub fn normalize_raw_token(raw: &str) -> Vec<String> {
    // Step 1: lowercase. Only ASCII letters survive step 4, so ASCII
    // folding is sufficient.
    let lowered: Vec<char> = raw.chars().map(|c| c.to_ascii_lowercase()).collect();

    // Step 2: drop comma/whitespace runs that separate two digits.
    let mut stripped: Vec<char> = Vec::with_capacity(lowered.len());
    let mut i = 0;
    while i < lowered.len() {
        let c = lowered[i];
        if c == ',' || c.is_whitespace() {
            let mut j = i;
            while j < lowered.len() && (lowered[j] == ',' || lowered[j].is_whitespace()) {
                j += 1;
            }
            let prev_digit = stripped.last().is_some_and(|p| p.is_ascii_digit());
            let next_digit = lowered.get(j).is_some_and(|n| n.is_ascii_digit());
            if !(prev_digit && next_digit) {
                stripped.extend(&lowered[i..j]);
            }
            i = j;
        } else {
            stripped.push(c);
            i += 1;
        }
    }

    // Steps 3 + 4: keep alphanumerics and protected decimal points, space
    // out everything else.
    let mut spaced = String::with_capacity(stripped.len());
    for (k, &c) in stripped.iter().enumerate() {
        if c.is_ascii_alphanumeric() {
            spaced.push(c);
        } else if c == '.'
            && k > 0
            && stripped[k - 1].is_ascii_digit()
            && stripped.get(k + 1).is_some_and(|n| n.is_ascii_digit())
        {
            spaced.push('.');
        } else {
            spaced.push(' ');
        }
    }

    // Step 5: collapse and split.
    spaced.split_whitespace().map(str::to_string).collect()
}

/// Tokenize a block's text into its normalized token sequence.
pub fn tokenize_block(text: &str) -> Vec<String> {
    raw_spans(text)
        .iter()
        .flat_map(|span| normalize_raw_token(&text[span.start..span.end]))
        .collect()
}

/// Tokenize a block and build its format mapping in one pass.
///
/// Every normalized token gets a [`TokenPosition`] carrying the raw
/// token's full span; sub-tokens of one raw token share that span.
pub fn build_mapping(draft_id: &DraftId, text: &str) -> (Vec<String>, FormatMapping) {
    let mut tokens: Vec<String> = Vec::new();
    let mut positions: Vec<TokenPosition> = Vec::new();

    for span in raw_spans(text) {
        let raw = &text[span.start..span.end];
        for sub in normalize_raw_token(raw) {
            positions.push(TokenPosition {
                token_index: tokens.len(),
                start_char: span.start,
                end_char: span.end,
                original_text: raw.to_string(),
                normalized_text: sub.clone(),
            });
            tokens.push(sub);
        }
    }

    debug!(
        draft = %draft_id,
        raw_tokens = raw_spans(text).len(),
        normalized_tokens = tokens.len(),
        "tokenized block"
    );

    let mapping = FormatMapping {
        draft_id: draft_id.clone(),
        original_text: text.to_string(),
        token_positions: positions,
    };
    (tokens, mapping)
}

/// Formatting patterns worth surfacing in diagnostics: bearings, degree
/// notations, parenthesized numerals, comma-grouped and decimal numbers.
fn format_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            ("bearing", r"^[NSns]\s*\.?\s*\d+°"),
            ("degrees", r"^\d+°"),
            ("parenthesized", r"^\(\d+\)"),
            ("direction_abbrev", r"^[NSEWnsew]\.$"),
            ("comma_number", r"^\d{1,3}(,\d{3})+"),
            ("decimal_number", r"^\d+\.\d+"),
        ]
        .iter()
        .map(|(name, pat)| (*name, Regex::new(pat).expect("static pattern")))
        .collect()
    })
}

/// Counts of recognized formatting patterns in one mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingStats {
    /// Raw substrings whose text differs from their normalized form.
    pub formatted_substrings: usize,
    /// Pattern-name → occurrence count, in pattern priority order.
    pub pattern_counts: Vec<(String, usize)>,
}

/// Tally the formatting patterns present in a mapping.
///
/// Purely diagnostic: the engine logs these at debug level so a reviewer
/// can see how much formatting the reconstructor will be responsible for.
pub fn formatting_statistics(mapping: &FormatMapping) -> FormattingStats {
    let mut stats = FormattingStats::default();
    let mut counts = vec![0usize; format_patterns().len()];

    for group in mapping.span_groups() {
        let normalized: Vec<&str> = mapping.token_positions
            [group.first_index..=group.last_index]
            .iter()
            .map(|p| p.normalized_text.as_str())
            .collect();
        if group.original_text != normalized.join(" ") {
            stats.formatted_substrings += 1;
        }
        for (i, (_, pattern)) in format_patterns().iter().enumerate() {
            if pattern.is_match(&group.original_text) {
                counts[i] += 1;
                break;
            }
        }
    }

    stats.pattern_counts = format_patterns()
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|((name, _), n)| (name.to_string(), n))
        .collect();
    stats
}
