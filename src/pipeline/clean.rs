//! Text cleanup: deterministic normalization of extracted text.
//!
//! Extractors hand us text with whatever line endings, stray zero-width
//! characters and padding the source happened to carry. Every adapter runs
//! its text through [`clean_text`] before building blocks, so the structure
//! builder only ever sees normalized strings.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the per-line rules see `\n` only;
//! invisible characters are removed before trimming so a line holding just a
//! zero-width space becomes blank and can be collapsed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one extracted text fragment.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, ...)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines down to a single blank line
/// 5. Trim the fragment as a whole
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Collapse every whitespace run (newlines included) to a single space.
///
/// Used for single-line values such as headings and page titles.
pub fn squash_whitespace(input: &str) -> String {
    remove_invisible_chars(input)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(clean_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn invisible_chars_are_removed() {
        assert_eq!(clean_text("\u{FEFF}Menu\u{200B} card"), "Menu card");
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        assert_eq!(clean_text("first   \nsecond\t"), "first\nsecond");
    }

    #[test]
    fn blank_runs_collapse_to_one_blank_line() {
        assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a\n \n\u{200B}\n\nb"), "a\n\nb");
    }

    #[test]
    fn outer_padding_is_trimmed() {
        assert_eq!(clean_text("\n\n  Title  \n\n"), "Title");
        assert_eq!(clean_text(" \u{00AD} "), "");
    }

    #[test]
    fn squash_collapses_everything() {
        assert_eq!(squash_whitespace("  Our \n\n  Story\t "), "Our Story");
    }
}
