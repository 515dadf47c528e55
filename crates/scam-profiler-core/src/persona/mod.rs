//! Persona synthesis: human-readable cluster summaries.
//!
//! Each non-noise cluster becomes a [`Persona`]: representative keywords
//! ranked by in-cluster frequency, aggregate signal-flag rates, a sample
//! text, and a templated narrative selected from the rule table in
//! [`rules`].

pub mod rules;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PersonaConfig;
use crate::features::stopwords::is_stop_word;
use crate::features::SignalFlags;

use rules::rule_for;

/// Keywords at or below this length are discarded.
const MIN_KEYWORD_LEN: usize = 3;

/// Aggregate signal-flag rates over one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalRates {
    /// Fraction of members with the threat flag set.
    pub kw_threat: f64,
    /// Fraction of members with the payment flag set.
    pub kw_payment: f64,
    pub avg_url_count: f64,
    pub avg_upper_ratio: f64,
    pub avg_punct_ratio: f64,
}

impl SignalRates {
    /// Mean rates over a cluster's flags. Empty input is all zeros.
    pub fn aggregate(flags: &[SignalFlags]) -> Self {
        if flags.is_empty() {
            return Self {
                kw_threat: 0.0,
                kw_payment: 0.0,
                avg_url_count: 0.0,
                avg_upper_ratio: 0.0,
                avg_punct_ratio: 0.0,
            };
        }
        let n = flags.len() as f64;
        Self {
            kw_threat: flags.iter().filter(|f| f.kw_threat).count() as f64 / n,
            kw_payment: flags.iter().filter(|f| f.kw_payment).count() as f64 / n,
            avg_url_count: flags.iter().map(|f| f64::from(f.url_count)).sum::<f64>() / n,
            avg_upper_ratio: flags.iter().map(|f| f64::from(f.upper_ratio)).sum::<f64>() / n,
            avg_punct_ratio: flags.iter().map(|f| f64::from(f.punct_ratio)).sum::<f64>() / n,
        }
    }
}

/// Synthesized summary of one discovered cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Internal cluster id this persona describes.
    pub cluster: i32,
    /// Heuristic name: rule label + cluster id.
    pub name: String,
    pub top_terms: Vec<String>,
    pub signals: SignalRates,
    pub n_samples: usize,
    /// Representative (redacted) text, truncated.
    pub sample_text: String,
    pub narrative: String,
    pub mitigations: Vec<String>,
}

/// Frequency-ranked keywords over a cluster's texts.
///
/// Tokens are lowercased, split on non-alphanumerics, and dropped when
/// short or stop-words. Frequency ties break lexicographically so the
/// top-K is stable across runs.
pub fn extract_keywords<'a, I>(texts: I, top_k: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > MIN_KEYWORD_LEN && !is_stop_word(t))
        {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_k);
    ranked.into_iter().map(|(term, _)| term).collect()
}

/// Synthesize the persona for one cluster.
///
/// `texts` and `flags` are the cluster members in record order.
pub fn synthesize(
    cluster: i32,
    texts: &[&str],
    flags: &[SignalFlags],
    config: &PersonaConfig,
) -> Persona {
    let signals = SignalRates::aggregate(flags);
    let rule = rule_for(signals.kw_threat, signals.kw_payment);

    let sample_text = texts
        .first()
        .map(|t| t.chars().take(config.max_sample_len).collect())
        .unwrap_or_default();

    Persona {
        cluster,
        name: format!("{} #{}", rule.label, cluster),
        top_terms: extract_keywords(texts.iter().copied(), config.top_k),
        signals,
        n_samples: texts.len(),
        sample_text,
        narrative: rule.narrative.to_string(),
        mitigations: rule.mitigations.iter().map(|m| m.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_drop_short_and_stop_words() {
        let keywords = extract_keywords(
            ["the account was suspended", "account now suspended for you"],
            10,
        );
        assert!(keywords.contains(&"account".to_string()));
        assert!(keywords.contains(&"suspended".to_string()));
        assert!(!keywords.contains(&"the".to_string()), "stop-word");
        assert!(!keywords.contains(&"was".to_string()), "short and stop");
        assert!(!keywords.contains(&"now".to_string()), "length <= 3");
    }

    #[test]
    fn test_keywords_rank_by_frequency_then_alpha() {
        let keywords = extract_keywords(
            ["wire wire wire prize prize claim", "prize alert alert"],
            3,
        );
        // wire:3, prize:3, alert:2 -> tie between prize/wire broken
        // alphabetically.
        assert_eq!(keywords, ["prize", "wire", "alert"]);
    }

    #[test]
    fn test_keywords_strip_punctuation() {
        let keywords = extract_keywords(["verify... verify!! account?"], 5);
        assert_eq!(keywords, ["verify", "account"]);
    }

    #[test]
    fn test_synthesize_selects_rule_and_truncates_sample() {
        let flags = vec![
            SignalFlags {
                kw_threat: true,
                kw_payment: false,
                url_count: 1,
                upper_ratio: 0.2,
                punct_ratio: 0.05,
            },
            SignalFlags {
                kw_threat: true,
                kw_payment: false,
                url_count: 0,
                upper_ratio: 0.1,
                punct_ratio: 0.02,
            },
        ];
        let config = PersonaConfig {
            top_k: 5,
            max_sample_len: 10,
        };
        let persona = synthesize(
            3,
            &["account suspended immediately", "suspended account arrest"],
            &flags,
            &config,
        );
        assert_eq!(persona.cluster, 3);
        assert_eq!(persona.name, "Tech-Support Impersonator #3");
        assert_eq!(persona.n_samples, 2);
        assert_eq!(persona.sample_text.chars().count(), 10);
        assert!((persona.signals.kw_threat - 1.0).abs() < 1e-9);
        assert!(!persona.mitigations.is_empty());
    }

    #[test]
    fn test_empty_cluster_synthesizes_defaults() {
        let persona = synthesize(0, &[], &[], &PersonaConfig::default());
        assert_eq!(persona.n_samples, 0);
        assert!(persona.top_terms.is_empty());
        assert_eq!(persona.sample_text, "");
        assert_eq!(persona.name, "Romance Impersonator #0");
    }
}
