//! Feature construction: lexical n-gram matrices + signal flags.
//!
//! ```text
//! cleaned texts ──┬─> char TF-IDF (3-5 grams)  ─┐
//!                 ├─> word TF-IDF (1-2 grams)  ─┼─ hstack ─> feature matrix
//!                 └─> signal flags (5 columns) ─┘
//! ```
//!
//! Flags are deterministic functions of the cleaned text only: lexical
//! matches are case-insensitive, the uppercase ratio is case-sensitive.

pub mod matrix;
pub mod stopwords;
pub mod tfidf;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::FeatureConfig;
use crate::error::{CoreError, CoreResult};
use crate::text::URL_RE;

use matrix::SparseMatrix;
use tfidf::{Analyzer, FittedVocabulary, TfidfVectorizer};

/// Threat/urgency lexicon.
static THREAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(arrest|lawsuit|suspend(?:ed)?|immediately|final notice|urgent)\b").unwrap()
});

/// Payment-coercion lexicon: gift cards, wire transfer, crypto, named
/// money-transfer services.
static PAYMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(steam|itunes|gift\s?card|bitcoin|crypto|wallet|wire|zelle|western union|moneygram)\b")
        .unwrap()
});

/// Punctuation characters counted by the punctuation ratio.
const PUNCT_CHARS: [char; 4] = ['!', '?', '.', ','];

/// Hand-authored per-record signal flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalFlags {
    /// Threat/urgency language present.
    pub kw_threat: bool,
    /// Payment-coercion language present.
    pub kw_payment: bool,
    /// Number of raw URLs.
    pub url_count: u32,
    /// Uppercase characters / total characters.
    pub upper_ratio: f32,
    /// `!?.,` characters / total characters.
    pub punct_ratio: f32,
}

impl SignalFlags {
    /// Extract flags from cleaned text.
    pub fn extract(text: &str) -> Self {
        let total = text.chars().count().max(1) as f32;
        let upper = text.chars().filter(|c| c.is_uppercase()).count() as f32;
        let punct = text.chars().filter(|c| PUNCT_CHARS.contains(c)).count() as f32;
        Self {
            kw_threat: THREAT_RE.is_match(text),
            kw_payment: PAYMENT_RE.is_match(text),
            url_count: URL_RE.find_iter(text).count() as u32,
            upper_ratio: upper / total,
            punct_ratio: punct / total,
        }
    }

    /// Dense column block appended to the lexical matrix.
    pub fn to_dense(&self) -> [f32; 5] {
        [
            f32::from(u8::from(self.kw_threat)),
            f32::from(u8::from(self.kw_payment)),
            self.url_count as f32,
            self.upper_ratio,
            self.punct_ratio,
        ]
    }

    /// Number of dense columns contributed per record.
    pub const WIDTH: usize = 5;
}

/// The feature matrix for one batch plus per-record flags.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// `[char tfidf | word tfidf | flags]`, one row per record.
    pub matrix: SparseMatrix,
    /// Per-record flags, same order as the matrix rows.
    pub flags: Vec<SignalFlags>,
    /// Fitted char vocabulary (diagnostics only; discarded with the run).
    pub char_vocab: FittedVocabulary,
    /// Fitted word vocabulary.
    pub word_vocab: FittedVocabulary,
}

/// Build the full feature matrix for a batch of cleaned texts.
///
/// Both vectorizers are fit jointly over the whole batch; output is
/// bit-identical across runs for the same input and config.
pub fn build_features(texts: &[String], config: &FeatureConfig) -> CoreResult<FeatureSet> {
    if texts.is_empty() {
        return Err(CoreError::EmptyBatch {
            context: "feature construction".to_string(),
        });
    }

    let char_vectorizer = TfidfVectorizer::new(Analyzer::Char, config.tfidf_char.clone());
    let word_vectorizer = TfidfVectorizer::new(
        Analyzer::Word {
            stop_words: config.stop_words,
        },
        config.tfidf_word.clone(),
    );

    let (char_vocab, char_matrix) = char_vectorizer.fit_transform(texts);
    let (word_vocab, word_matrix) = word_vectorizer.fit_transform(texts);

    let flags: Vec<SignalFlags> = texts.iter().map(|t| SignalFlags::extract(t)).collect();

    let mut flag_matrix = SparseMatrix::new(SignalFlags::WIDTH);
    for flag in &flags {
        let entries: Vec<(u32, f32)> = flag
            .to_dense()
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i as u32, v))
            .collect();
        flag_matrix.push_row(entries);
    }

    let matrix = char_matrix.hstack(&word_matrix).hstack(&flag_matrix);

    tracing::debug!(
        rows = matrix.n_rows(),
        char_terms = char_vocab.len(),
        word_terms = word_vocab.len(),
        "feature matrix built"
    );

    Ok(FeatureSet {
        matrix,
        flags,
        char_vocab,
        word_vocab,
    })
}
