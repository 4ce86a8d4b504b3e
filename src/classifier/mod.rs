//! Statistical fallback classifier
//!
//! When no stored question is similar enough to a query, a TF-IDF +
//! multinomial naive Bayes model trained on every taught pair guesses the
//! answer. Each distinct answer is a class.
//!
//! The model is always retrained from scratch, never updated in place, and
//! can be cached on disk as a JSON artifact. A missing, corrupt or stale
//! artifact is never fatal: the model is rebuilt from the store instead.

pub mod naive_bayes;
pub mod vectorizer;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::memory::{QaPair, QaStore};

pub use naive_bayes::NaiveBayes;
pub use vectorizer::Vectorizer;

/// Bump when the artifact layout changes; older artifacts are retrained
pub const ARTIFACT_VERSION: u32 = 1;

/// Outcome of a prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// Most probable stored answer
    Answer(String),
    /// No model has been trained yet
    Untrained,
    /// The query shares no known token with the training data
    NoSignal,
}

/// Summary of a trained model
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierStats {
    pub classes: usize,
    pub vocab_size: usize,
    pub trained_on: usize,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedModel {
    vectorizer: Vectorizer,
    model: NaiveBayes,
    /// Class index -> answer text
    classes: Vec<String>,
    /// Number of store rows the model was trained on
    trained_on: usize,
    trained_at: DateTime<Utc>,
}

impl FittedModel {
    fn is_consistent(&self) -> bool {
        self.vectorizer.is_consistent()
            && self.model.is_consistent(self.classes.len(), self.vectorizer.vocab_size())
    }
}

/// On-disk form of a trained model
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    version: u32,
    model: FittedModel,
}

/// Fallback classifier; starts untrained
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    fitted: Option<FittedModel>,
}

impl Classifier {
    pub fn untrained() -> Self {
        Self::default()
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    /// Store rows the current model was trained on, if trained
    pub fn trained_on(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.trained_on)
    }

    pub fn stats(&self) -> Option<ClassifierStats> {
        self.fitted.as_ref().map(|f| ClassifierStats {
            classes: f.classes.len(),
            vocab_size: f.vectorizer.vocab_size(),
            trained_on: f.trained_on,
            trained_at: f.trained_at,
        })
    }

    /// Retrain from scratch on the full set of pairs.
    ///
    /// An empty set leaves the current model (or untrained state) untouched
    /// and returns `false`.
    pub fn train(&mut self, pairs: &[QaPair]) -> bool {
        if pairs.is_empty() {
            warn!("No taught responses yet, classifier left unchanged");
            return false;
        }

        let questions: Vec<&str> = pairs.iter().map(|p| p.question.as_str()).collect();
        let vectorizer = Vectorizer::fit(&questions);

        let mut classes: Vec<String> = Vec::new();
        let mut class_index: HashMap<&str, usize> = HashMap::new();
        let mut labels = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let idx = *class_index.entry(pair.answer.as_str()).or_insert_with(|| {
                classes.push(pair.answer.clone());
                classes.len() - 1
            });
            labels.push(idx);
        }

        let samples: Vec<_> = questions.iter().map(|q| vectorizer.transform(q)).collect();
        let model = NaiveBayes::fit(&samples, &labels, classes.len(), vectorizer.vocab_size());

        info!(
            "Trained classifier on {} pairs ({} answers, {} terms)",
            pairs.len(),
            classes.len(),
            vectorizer.vocab_size()
        );

        self.fitted = Some(FittedModel {
            vectorizer,
            model,
            classes,
            trained_on: pairs.len(),
            trained_at: Utc::now(),
        });
        true
    }

    /// Most probable answer for a query
    pub fn predict(&self, query: &str) -> Prediction {
        let Some(fitted) = &self.fitted else {
            return Prediction::Untrained;
        };

        let vector = fitted.vectorizer.transform(query);
        if vector.is_empty() {
            debug!("No known terms in '{}'", query);
            return Prediction::NoSignal;
        }

        match fitted.model.predict(&vector).and_then(|c| fitted.classes.get(c)) {
            Some(answer) => Prediction::Answer(answer.clone()),
            None => Prediction::NoSignal,
        }
    }

    /// Write the trained model to `path` (temp file + rename)
    pub async fn save(&self, path: &Path) -> Result<()> {
        let fitted = self.fitted.as_ref()
            .context("Cannot save an untrained classifier")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await
                    .context("Failed to create model directory")?;
            }
        }

        let artifact = ModelArtifact {
            version: ARTIFACT_VERSION,
            model: fitted.clone(),
        };
        let json = serde_json::to_vec(&artifact)
            .context("Failed to serialize classifier")?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path).await
            .with_context(|| format!("Failed to move model into {}", path.display()))?;

        debug!("Saved classifier to {}", path.display());
        Ok(())
    }

    /// Read a model written by [`Classifier::save`]
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .context("Failed to parse classifier artifact")?;

        if artifact.version != ARTIFACT_VERSION {
            anyhow::bail!(
                "Classifier artifact version {} does not match {}",
                artifact.version,
                ARTIFACT_VERSION
            );
        }
        if !artifact.model.is_consistent() {
            anyhow::bail!("Classifier artifact is internally inconsistent");
        }

        Ok(Self {
            fitted: Some(artifact.model),
        })
    }

    /// Load the cached artifact if it matches the store, otherwise retrain.
    ///
    /// Only store failures are returned; artifact problems are logged and
    /// answered by retraining.
    pub async fn load_or_train(model_path: Option<&Path>, store: &QaStore) -> Result<Self, StoreError> {
        let rows = store.count().await?;

        if let Some(path) = model_path {
            match Self::load(path).await {
                Ok(classifier) if classifier.trained_on() == Some(rows) => {
                    info!("Loaded classifier from {}", path.display());
                    return Ok(classifier);
                }
                Ok(classifier) => {
                    warn!(
                        "Classifier artifact is stale ({:?} rows vs {} in store), retraining",
                        classifier.trained_on(),
                        rows
                    );
                }
                Err(e) if path.exists() => {
                    warn!("Could not load classifier ({:#}), retraining", e);
                }
                Err(_) => {
                    debug!("No classifier artifact at {}", path.display());
                }
            }
        }

        let pairs = store.all_pairs().await?;
        let mut classifier = Self::untrained();
        if classifier.train(&pairs) {
            if let Some(path) = model_path {
                if let Err(e) = classifier.save(path).await {
                    warn!("Failed to save classifier: {:#}", e);
                }
            }
        }
        Ok(classifier)
    }
}
