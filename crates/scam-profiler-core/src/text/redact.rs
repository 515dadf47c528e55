//! PII redaction with stable pseudonymous tokens.
//!
//! Emails, phone-like digit sequences and BTC-shaped wallet strings are
//! replaced, in that priority order, with tokens of the form
//! `[TAG:xxxxxxxx]`. The hash is a salted, truncated SHA-256 digest of the
//! exact matched surface, so the same entity yields the same token across
//! records while the original stays non-recoverable from artifacts.
//!
//! Redaction is idempotent: matches that fall inside an already-emitted
//! token are skipped, so running the redactor over its own output changes
//! nothing.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::types::{PiiTag, RedactionMap};

/// Salt mixed into every token digest. Fixed per build; the mapping from
/// token back to surface exists only in the per-run [`RedactionMap`].
const TOKEN_SALT: &str = "scam-profiler:pii";

/// Length of the hex digest kept in a token.
const TOKEN_HASH_LEN: usize = 8;

pub static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-z]{2,}\b").unwrap());

/// Phone-like runs: at least 7 digits allowing +, spaces, dashes, parens.
pub static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\+?\d[\s\-()]?){7,}\d\b").unwrap());

/// Legacy and bech32 BTC address shapes.
pub static WALLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:bc1|[13])[a-km-zA-HJ-NP-Z1-9]{25,39}\b").unwrap());

/// Already-emitted redaction tokens; matches inside these are skipped.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:EMAIL|PHONE|WALLET):[0-9a-f]{8}\]").unwrap());

/// Stable, non-reversible token digest for a PII surface.
pub fn hash_token(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(TOKEN_SALT.as_bytes());
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..TOKEN_HASH_LEN].to_string()
}

fn pattern_for(tag: PiiTag) -> &'static Regex {
    match tag {
        PiiTag::Email => &EMAIL_RE,
        PiiTag::Phone => &PHONE_RE,
        PiiTag::Wallet => &WALLET_RE,
    }
}

/// One substitution pass for a single tag, skipping existing tokens.
fn substitute(tag: PiiTag, input: &str, mapping: &mut RedactionMap) -> String {
    let guards: Vec<(usize, usize)> = TOKEN_RE
        .find_iter(input)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for m in pattern_for(tag).find_iter(input) {
        if guards.iter().any(|&(s, e)| m.start() >= s && m.end() <= e) {
            continue;
        }
        out.push_str(&input[last..m.start()]);
        out.push_str(&format!("[{}:{}]", tag.as_str(), hash_token(m.as_str())));
        mapping.push(tag, m.as_str().to_string());
        last = m.end();
    }
    out.push_str(&input[last..]);
    out
}

/// Replace emails/phones/wallets with stable tokens.
///
/// Returns the redacted text and the per-run mapping from tag to original
/// surfaces. Empty input yields empty output and an empty mapping.
pub fn pii_tokenize(text: &str) -> (String, RedactionMap) {
    let mut mapping = RedactionMap::default();
    let mut out = text.to_string();
    for tag in PiiTag::all() {
        out = substitute(tag, &out, &mut mapping);
    }
    (out, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_all_three_categories() {
        let text = "Contact helpdesk@fraud.example or +1 555-123-4567, \
                    send to 1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
        let (redacted, mapping) = pii_tokenize(text);

        assert!(redacted.contains("[EMAIL:"), "email must be tokenized");
        assert!(redacted.contains("[PHONE:"), "phone must be tokenized");
        assert!(redacted.contains("[WALLET:"), "wallet must be tokenized");
        assert!(!redacted.contains("helpdesk@fraud.example"));
        assert_eq!(mapping.originals(PiiTag::Email), ["helpdesk@fraud.example"]);
        assert_eq!(mapping.total(), 3);
    }

    #[test]
    fn test_token_is_deterministic() {
        assert_eq!(hash_token("a@b.example"), hash_token("a@b.example"));
        assert_ne!(hash_token("a@b.example"), hash_token("c@d.example"));
        assert_eq!(hash_token("a@b.example").len(), TOKEN_HASH_LEN);

        let (first, _) = pii_tokenize("mail a@b.example now");
        let (second, _) = pii_tokenize("mail a@b.example now");
        assert_eq!(first, second);
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let text = "call +44 7911 123456 and pay 1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
        let (once, _) = pii_tokenize(text);
        let (twice, mapping) = pii_tokenize(&once);
        assert_eq!(once, twice, "re-redacting must be a no-op");
        assert!(mapping.is_empty(), "second pass must not capture anything");
    }

    #[test]
    fn test_empty_input() {
        let (redacted, mapping) = pii_tokenize("");
        assert_eq!(redacted, "");
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_same_entity_same_token_across_records() {
        let (a, _) = pii_tokenize("reach me at shark@loans.example ok");
        let (b, _) = pii_tokenize("shark@loans.example sent another demand");
        let token_a = a.split_whitespace().find(|w| w.starts_with("[EMAIL")).unwrap();
        assert!(b.contains(token_a), "same surface must map to same token");
    }

    #[test]
    fn test_short_digit_runs_untouched() {
        let (redacted, mapping) = pii_tokenize("order #123456 confirmed");
        assert_eq!(redacted, "order #123456 confirmed");
        assert!(mapping.is_empty());
    }
}
