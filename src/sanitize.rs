//! Per-value content policy applied on both read and write
//!
//! Order is fixed: truncate, then reject dangerous signatures, then strip
//! markup. A signature that starts past the truncation point is cut away
//! rather than rejected.

use regex::{Regex, RegexSet};
use std::sync::LazyLock;

use crate::error::SanitizeError;
use crate::types::CellValue;

/// Blocked signatures, matched case-insensitively
pub const DANGEROUS_PATTERNS: [&str; 8] = [
    "javascript:",
    "vbscript:",
    "data:text/html",
    "<script",
    "eval(",
    "Function(",
    "document.",
    "window.",
];

static DANGEROUS_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(
        DANGEROUS_PATTERNS
            .iter()
            .map(|p| format!("(?i){}", regex::escape(p))),
    )
    .expect("static dangerous-pattern set")
});

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static markup pattern"));

/// Sanitize a single string value
///
/// # Examples
///
/// ```
/// use sheetguard::sanitize::sanitize;
///
/// assert_eq!(sanitize("  <b>bold</b> ", 100, false).unwrap(), "bold");
/// assert!(sanitize("javascript:alert(1)", 100, false).is_err());
/// ```
pub fn sanitize(raw: &str, max_len: usize, allow_html: bool) -> Result<String, SanitizeError> {
    let trimmed = raw.trim();

    let value = match trimmed.char_indices().nth(max_len) {
        Some((cut, _)) => {
            log::warn!(
                "Cell content truncated from {} to {} characters",
                trimmed.chars().count(),
                max_len
            );
            &trimmed[..cut]
        }
        None => trimmed,
    };

    if let Some(idx) = DANGEROUS_SET.matches(value).iter().next() {
        return Err(SanitizeError::DangerousPattern {
            pattern: DANGEROUS_PATTERNS[idx],
        });
    }

    if !allow_html && MARKUP_RE.is_match(value) {
        log::debug!("Stripping markup from cell content");
        return Ok(MARKUP_RE.replace_all(value, "").into_owned());
    }

    Ok(value.to_string())
}

/// Sanitize a typed cell; `Empty` maps to the empty string
pub fn sanitize_value(
    value: &CellValue,
    max_len: usize,
    allow_html: bool,
) -> Result<String, SanitizeError> {
    match value {
        CellValue::Empty => Ok(String::new()),
        CellValue::Text(s) => sanitize(s, max_len, allow_html),
        other => sanitize(&other.as_string(), max_len, allow_html),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_passes_plain_text() {
        assert_eq!(sanitize("  Cable  ", 100, false).unwrap(), "Cable");
        assert_eq!(sanitize_value(&CellValue::Empty, 100, false).unwrap(), "");
        assert_eq!(
            sanitize_value(&CellValue::Number(100.0), 100, false).unwrap(),
            "100"
        );
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        assert_eq!(sanitize("abcdef", 3, false).unwrap(), "abc");
        assert_eq!(sanitize("ééééé", 2, false).unwrap(), "éé");
        assert_eq!(sanitize("abc", 3, false).unwrap(), "abc");
    }

    #[test]
    fn test_rejects_dangerous_patterns_case_insensitively() {
        let cases = [
            ("JavaScript:void(0)", "javascript:"),
            ("<SCRIPT>alert(1)</SCRIPT>", "<script"),
            ("x = EVAL(y)", "eval("),
            ("new function(a)", "Function("),
            ("Document.cookie", "document."),
            ("data:text/html;base64,AAAA", "data:text/html"),
        ];
        for (input, pattern) in cases {
            assert_eq!(
                sanitize(input, 1000, true),
                Err(SanitizeError::DangerousPattern { pattern }),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_pattern_past_truncation_point_is_cut_not_rejected() {
        let value = format!("{}<script>", "a".repeat(10));
        assert_eq!(sanitize(&value, 10, false).unwrap(), "a".repeat(10));
    }

    #[test]
    fn test_markup_policy() {
        assert_eq!(sanitize("<b>Pole</b> 12", 100, false).unwrap(), "Pole 12");
        assert_eq!(sanitize("<b>Pole</b> 12", 100, true).unwrap(), "<b>Pole</b> 12");
        assert_eq!(sanitize("a < b", 100, false).unwrap(), "a < b");
    }
}
