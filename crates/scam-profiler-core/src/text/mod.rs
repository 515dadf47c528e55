//! Text normalization and entity surface extraction.
//!
//! The first pipeline stage: raw message text is Unicode-canonicalized and
//! whitespace-collapsed here, and URL/domain surfaces are pulled out for
//! the entity graph. PII masking lives in [`redact`], the language filter
//! in [`language`].

pub mod language;
pub mod redact;

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Raw URL surfaces, e.g. `https://evil.example/path`.
pub static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)>\]]+").unwrap());

/// Host part of a URL, captured.
pub static DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://([^/\s)>\]]+)").unwrap());

/// Unicode NFKC canonicalization + whitespace collapse + trim.
///
/// Case is preserved; lowercasing is the vectorizer's concern. `None`-ish
/// input (empty string) comes back empty rather than panicking.
pub fn normalize(raw: &str) -> String {
    let canonical: String = raw.nfkc().collect();
    canonical.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All URL hosts mentioned in the text, in order of appearance.
pub fn extract_domains(text: &str) -> Vec<String> {
    DOMAIN_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace_and_trims() {
        assert_eq!(normalize("  hello   \t world \n"), "hello world");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_applies_nfkc() {
        // Fullwidth letters and the ligature fold to ASCII under NFKC.
        assert_eq!(normalize("ＡＢＣ"), "ABC");
        assert_eq!(normalize("ﬁnal notice"), "final notice");
    }

    #[test]
    fn test_normalize_preserves_case() {
        assert_eq!(normalize("URGENT Action"), "URGENT Action");
    }

    #[test]
    fn test_extract_domains() {
        let text = "click http://evil.example/verify or https://pay.example.net now";
        assert_eq!(extract_domains(text), ["evil.example", "pay.example.net"]);
        assert!(extract_domains("no links here").is_empty());
    }
}
