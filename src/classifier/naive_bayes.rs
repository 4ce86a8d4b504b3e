//! Multinomial naive Bayes over TF-IDF features

use serde::{Deserialize, Serialize};

use super::vectorizer::SparseVector;

/// Laplace smoothing
const ALPHA: f64 = 1.0;

/// Fitted multinomial naive Bayes model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NaiveBayes {
    /// log P(class)
    class_log_prior: Vec<f64>,
    /// log P(feature | class), flattened [num_classes * num_features]
    feature_log_prob: Vec<f64>,
    num_features: usize,
}

impl NaiveBayes {
    /// Fit from feature vectors and their class indices.
    ///
    /// `labels[i]` must be `< num_classes` and `samples[i]` indices `< num_features`.
    pub fn fit(samples: &[SparseVector], labels: &[usize], num_classes: usize, num_features: usize) -> Self {
        let mut class_count = vec![0f64; num_classes];
        let mut feature_count = vec![0f64; num_classes * num_features];

        for (vector, &class) in samples.iter().zip(labels) {
            class_count[class] += 1.0;
            for &(feature, weight) in vector {
                feature_count[class * num_features + feature] += weight;
            }
        }

        let total: f64 = class_count.iter().sum();
        let class_log_prior = class_count
            .iter()
            .map(|&c| if c > 0.0 { (c / total).ln() } else { f64::NEG_INFINITY })
            .collect();

        let mut feature_log_prob = vec![0f64; num_classes * num_features];
        for c in 0..num_classes {
            let row = &feature_count[c * num_features..(c + 1) * num_features];
            let denom = row.iter().sum::<f64>() + ALPHA * num_features as f64;
            for (f, &count) in row.iter().enumerate() {
                feature_log_prob[c * num_features + f] = ((count + ALPHA) / denom).ln();
            }
        }

        Self {
            class_log_prior,
            feature_log_prob,
            num_features,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_log_prior.len()
    }

    /// Most probable class for a vector. Ties go to the lower class index.
    pub fn predict(&self, vector: &SparseVector) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for (c, &prior) in self.class_log_prior.iter().enumerate() {
            let offset = c * self.num_features;
            let score = prior
                + vector
                    .iter()
                    .map(|&(f, w)| w * self.feature_log_prob[offset + f])
                    .sum::<f64>();
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((c, score));
            }
        }

        best.map(|(c, _)| c)
    }

    pub(crate) fn is_consistent(&self, num_classes: usize, vocab_size: usize) -> bool {
        self.num_features == vocab_size
            && self.class_log_prior.len() == num_classes
            && self.feature_log_prob.len() == num_classes * vocab_size
    }
}
