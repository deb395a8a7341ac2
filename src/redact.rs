//! Redaction of private spans
//!
//! Text wrapped in `<private>...</private>` must never reach persistent
//! media. The store applies this filter on every write path; the transport
//! facades apply it again on the way in (the store is the authority).

use once_cell::sync::Lazy;
use regex::Regex;

/// Replacement token left in place of a redacted span
pub const REDACTED: &str = "[REDACTED]";

// Case-insensitive, dot matches newline, shortest match. A nested
// <private> inside <private> collapses into one [REDACTED] for the
// outer span's shortest match.
static PRIVATE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<private>.*?</private>").expect("valid redaction regex"));

/// Replace every `<private>...</private>` span with `[REDACTED]` and trim
/// surrounding whitespace. Idempotent.
pub fn strip_private_tags(text: &str) -> String {
    PRIVATE_TAG.replace_all(text, REDACTED).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_single_span() {
        assert_eq!(
            strip_private_tags("key=<private>sk-123</private> done"),
            "key=[REDACTED] done"
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            strip_private_tags("<PRIVATE>secret</Private>"),
            "[REDACTED]"
        );
    }

    #[test]
    fn test_multiline_span() {
        assert_eq!(
            strip_private_tags("a <private>line1\nline2</private> b"),
            "a [REDACTED] b"
        );
    }

    #[test]
    fn test_multiple_spans() {
        assert_eq!(
            strip_private_tags("<private>a</private> x <private>b</private>"),
            "[REDACTED] x [REDACTED]"
        );
    }

    #[test]
    fn test_nested_tags_single_token() {
        let out = strip_private_tags("<private>outer <private>inner</private> tail");
        assert_eq!(out, "[REDACTED] tail");
    }

    #[test]
    fn test_idempotent() {
        let once = strip_private_tags("  <private>x</private> trailing  ");
        assert_eq!(once, strip_private_tags(&once));
    }

    #[test]
    fn test_no_tags_trims_only() {
        assert_eq!(strip_private_tags("  plain text  "), "plain text");
    }

    #[test]
    fn test_unclosed_tag_left_alone() {
        assert_eq!(strip_private_tags("<private>dangling"), "<private>dangling");
    }
}
