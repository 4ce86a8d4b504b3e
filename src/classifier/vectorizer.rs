//! TF-IDF text vectorization

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sparse document vector: (vocabulary index, weight)
pub type SparseVector = Vec<(usize, f64)>;

/// Fitted TF-IDF vocabulary.
///
/// idf is smoothed (`ln((1 + n) / (1 + df)) + 1`) and every vector is
/// L2-normalized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vectorizer {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl Vectorizer {
    /// Learn vocabulary and idf weights from a corpus
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for doc in documents {
            let mut seen = std::collections::HashSet::new();
            for tok in tokenize(doc.as_ref()) {
                let next = vocab.len();
                let idx = *vocab.entry(tok).or_insert(next);
                if idx == doc_freq.len() {
                    doc_freq.push(0);
                }
                if seen.insert(idx) {
                    doc_freq[idx] += 1;
                }
            }
        }

        let n = documents.len() as f64;
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Self { vocab, idf }
    }

    /// Vectorize a document against the fitted vocabulary.
    ///
    /// Unknown tokens are dropped; an empty vector means nothing in the
    /// document was seen during fitting.
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for tok in tokenize(document) {
            if let Some(&idx) = self.vocab.get(&tok) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        vector.sort_by_key(|(idx, _)| *idx);

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in vector.iter_mut() {
                *w /= norm;
            }
        }
        vector
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Whether the idf table lines up with the vocabulary
    pub(crate) fn is_consistent(&self) -> bool {
        self.idf.len() == self.vocab.len() && self.vocab.values().all(|&i| i < self.idf.len())
    }
}

/// Lower-cased alphanumeric runs of at least two characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() >= 2)
        .map(|s| s.to_string())
        .collect()
}
