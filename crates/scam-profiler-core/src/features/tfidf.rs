//! TF-IDF vectorization over character and word n-grams.
//!
//! Both vectorizers are fit jointly over the full batch (no incremental
//! fitting). Determinism: the vocabulary is capped by corpus frequency with
//! lexicographic tie-breaks and indexed in sorted order, idf uses the
//! smoothed formula `ln((1+n)/(1+df)) + 1`, and rows are L2-normalized, so
//! identical input and config produce bit-identical output.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::TfidfConfig;

use super::matrix::SparseMatrix;
use super::stopwords::is_stop_word;

/// Word tokens: two or more word characters.
static WORD_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Term analyzer: character n-grams or stop-word-filtered word n-grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyzer {
    /// Character n-grams over the lowercased text, whitespace included.
    Char,
    /// Word n-grams over lowercased tokens.
    Word {
        /// Drop English stop-words before building n-grams.
        stop_words: bool,
    },
}

/// The vocabulary fitted on one batch, discarded with the run.
#[derive(Debug, Clone)]
pub struct FittedVocabulary {
    /// Terms in index order (sorted lexicographically).
    pub terms: Vec<String>,
    /// Smoothed inverse document frequency per term.
    pub idf: Vec<f32>,
}

impl FittedVocabulary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// One TF-IDF vectorizer (char- or word-level).
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    analyzer: Analyzer,
    config: TfidfConfig,
}

impl TfidfVectorizer {
    pub fn new(analyzer: Analyzer, config: TfidfConfig) -> Self {
        Self { analyzer, config }
    }

    /// Break one document into terms.
    fn analyze(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let (lo, hi) = self.config.ngram_range;
        match self.analyzer {
            Analyzer::Char => {
                let chars: Vec<char> = lowered.chars().collect();
                let mut terms = Vec::new();
                for n in lo..=hi {
                    if n == 0 || n > chars.len() {
                        continue;
                    }
                    for window in chars.windows(n) {
                        terms.push(window.iter().collect::<String>());
                    }
                }
                terms
            }
            Analyzer::Word { stop_words } => {
                let tokens: Vec<&str> = WORD_TOKEN_RE
                    .find_iter(&lowered)
                    .map(|m| m.as_str())
                    .filter(|t| !stop_words || !is_stop_word(t))
                    .collect();
                let mut terms = Vec::new();
                for n in lo..=hi {
                    if n == 0 || n > tokens.len() {
                        continue;
                    }
                    for window in tokens.windows(n) {
                        terms.push(window.join(" "));
                    }
                }
                terms
            }
        }
    }

    /// Fit the vocabulary on the batch and produce the weighted matrix.
    ///
    /// Vocabulary selection: drop terms below `min_df`, then keep the
    /// `max_features` most frequent terms by corpus count (ties broken
    /// lexicographically), then index in sorted order.
    pub fn fit_transform(&self, texts: &[String]) -> (FittedVocabulary, SparseMatrix) {
        let n_docs = texts.len();

        let mut doc_counts: Vec<HashMap<String, u32>> = Vec::with_capacity(n_docs);
        let mut df: HashMap<String, u32> = HashMap::new();
        let mut corpus_tf: HashMap<String, u64> = HashMap::new();

        for text in texts {
            let mut counts: HashMap<String, u32> = HashMap::new();
            for term in self.analyze(text) {
                *counts.entry(term).or_insert(0) += 1;
            }
            for (term, count) in &counts {
                *df.entry(term.clone()).or_insert(0) += 1;
                *corpus_tf.entry(term.clone()).or_insert(0) += u64::from(*count);
            }
            doc_counts.push(counts);
        }

        let mut candidates: Vec<String> = df
            .iter()
            .filter(|(_, &count)| count as usize >= self.config.min_df)
            .map(|(term, _)| term.clone())
            .collect();

        if candidates.len() > self.config.max_features {
            candidates.sort_unstable_by(|a, b| {
                corpus_tf[b]
                    .cmp(&corpus_tf[a])
                    .then_with(|| a.cmp(b))
            });
            candidates.truncate(self.config.max_features);
        }
        candidates.sort_unstable();

        let index: HashMap<&str, u32> = candidates
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_str(), i as u32))
            .collect();

        let idf: Vec<f32> = candidates
            .iter()
            .map(|term| {
                let d = f64::from(df[term]);
                (((1.0 + n_docs as f64) / (1.0 + d)).ln() + 1.0) as f32
            })
            .collect();

        let mut matrix = SparseMatrix::new(candidates.len());
        for counts in &doc_counts {
            let mut entries: Vec<(u32, f32)> = counts
                .iter()
                .filter_map(|(term, &count)| {
                    index
                        .get(term.as_str())
                        .map(|&col| (col, count as f32 * idf[col as usize]))
                })
                .collect();
            entries.sort_unstable_by_key(|&(col, _)| col);

            let norm = entries.iter().map(|&(_, v)| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for entry in &mut entries {
                    entry.1 /= norm;
                }
            }
            matrix.push_row(entries);
        }

        (
            FittedVocabulary {
                terms: candidates,
                idf,
            },
            matrix,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tfidf(analyzer: Analyzer, ngram: (usize, usize), min_df: usize) -> TfidfVectorizer {
        TfidfVectorizer::new(
            analyzer,
            TfidfConfig {
                ngram_range: ngram,
                min_df,
                max_features: 1000,
            },
        )
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_char_ngrams() {
        let v = tfidf(Analyzer::Char, (2, 3), 1);
        let terms = v.analyze("Abcd");
        assert_eq!(terms, ["ab", "bc", "cd", "abc", "bcd"]);
    }

    #[test]
    fn test_word_ngrams_drop_stop_words_before_pairing() {
        let v = tfidf(Analyzer::Word { stop_words: true }, (1, 2), 1);
        let terms = v.analyze("the account is suspended");
        // "the"/"is" removed first, so the bigram bridges the gap.
        assert_eq!(terms, ["account", "suspended", "account suspended"]);
    }

    #[test]
    fn test_min_df_filters_rare_terms() {
        let v = tfidf(Analyzer::Word { stop_words: false }, (1, 1), 2);
        let (vocab, _) = v.fit_transform(&texts(&[
            "wire transfer today",
            "wire money today",
            "unique",
        ]));
        assert!(vocab.terms.contains(&"wire".to_string()));
        assert!(vocab.terms.contains(&"today".to_string()));
        assert!(!vocab.terms.contains(&"unique".to_string()));
        assert!(!vocab.terms.contains(&"transfer".to_string()));
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let v = TfidfVectorizer::new(
            Analyzer::Word { stop_words: false },
            TfidfConfig {
                ngram_range: (1, 1),
                min_df: 1,
                max_features: 2,
            },
        );
        let (vocab, _) = v.fit_transform(&texts(&[
            "alpha alpha alpha beta beta gamma",
            "alpha beta",
        ]));
        assert_eq!(vocab.terms, ["alpha", "beta"]);
    }

    #[test]
    fn test_rows_are_l2_normalized() {
        let v = tfidf(Analyzer::Word { stop_words: false }, (1, 1), 1);
        let (_, matrix) = v.fit_transform(&texts(&["pay wire now", "wire wire fraud"]));
        for i in 0..matrix.n_rows() {
            assert!((matrix.row_norm(i) - 1.0).abs() < 1e-5, "row {} not unit", i);
        }
    }

    #[test]
    fn test_fit_transform_is_deterministic() {
        let batch = texts(&[
            "your account is suspended, verify immediately",
            "you won a prize, claim your gift card",
            "final notice: wire transfer required",
        ]);
        let v = tfidf(Analyzer::Char, (3, 5), 1);
        let (vocab_a, matrix_a) = v.fit_transform(&batch);
        let (vocab_b, matrix_b) = v.fit_transform(&batch);
        assert_eq!(vocab_a.terms, vocab_b.terms);
        for i in 0..matrix_a.n_rows() {
            assert_eq!(matrix_a.row(i), matrix_b.row(i), "row {} differs", i);
        }
    }

    #[test]
    fn test_empty_batch_yields_empty_vocab() {
        let v = tfidf(Analyzer::Char, (3, 5), 1);
        let (vocab, matrix) = v.fit_transform(&[]);
        assert!(vocab.is_empty());
        assert_eq!(matrix.n_rows(), 0);
    }
}
