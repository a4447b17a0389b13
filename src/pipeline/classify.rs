//! Heading classification: decide per text block whether it is a structural
//! heading or body content.
//!
//! The threshold is derived from the document itself. The most frequent font
//! size among non-empty text blocks is taken to be the body size, and
//! anything at least 20 % larger counts as a heading. A second rule catches
//! sources that mark headings with bold runs at body size: short bold blocks
//! are headings as well.

use crate::model::{Block, BlockKind};
use std::collections::HashMap;

/// Multiplier applied to the body size to get the heading threshold.
pub const HEADING_RATIO: f64 = 1.2;

/// Bold blocks shorter than this many characters are headings.
pub const BOLD_HEADING_MAX_CHARS: usize = 100;

/// Heading threshold for a block sequence.
///
/// `1.2 ×` the mode of the sizes (rounded to one decimal) of all non-empty
/// text blocks, or `f64::INFINITY` when there are none. Equal counts resolve
/// to the smaller size, so the result depends only on the multiset of sizes
/// and never on block order.
pub fn heading_threshold(blocks: &[Block]) -> f64 {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for block in blocks.iter().filter(|b| b.has_text()) {
        *counts.entry(tenths(block.font_size)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(size_a, count_a), (size_b, count_b)| {
            count_a.cmp(count_b).then_with(|| size_b.cmp(size_a))
        })
        .map(|(size, _)| size as f64 / 10.0 * HEADING_RATIO)
        .unwrap_or(f64::INFINITY)
}

/// `true` when `block` is a heading under `threshold`.
///
/// Image blocks and blank text blocks are never headings.
pub fn is_heading(block: &Block, threshold: f64) -> bool {
    if block.kind != BlockKind::Text {
        return false;
    }
    let text = block.text_str().trim();
    if text.is_empty() {
        return false;
    }
    block.font_size >= threshold || (block.is_bold && text.chars().count() < BOLD_HEADING_MAX_CHARS)
}

/// `true` when `block` is large enough to open a category on its own.
pub fn is_top_level(block: &Block, threshold: f64) -> bool {
    block.font_size >= threshold
}

fn tenths(size: f64) -> i64 {
    (size * 10.0).round() as i64
}
