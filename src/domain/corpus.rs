// ============================================================
// Layer 3 — Corpus Domain Type
// ============================================================
// A labelled corpus as it comes out of a dataset loader:
// one raw sentence per example, one class index per example,
// plus the ordered class names.
//
// Labels are stored as class indices and expanded to one-hot
// rows on demand. Since every one-hot row is built from the
// same `class_names`, all label vectors share dimension C.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    texts:       Vec<String>,
    labels:      Vec<usize>,
    class_names: Vec<String>,
}

impl Corpus {
    /// Build a corpus, checking that every text has a label and
    /// every label names an existing class.
    pub fn new(texts: Vec<String>, labels: Vec<usize>, class_names: Vec<String>) -> Result<Self> {
        if texts.len() != labels.len() {
            return Err(PipelineError::InvalidDataset(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            ))
            .into());
        }
        if let Some(bad) = labels.iter().find(|&&l| l >= class_names.len()) {
            return Err(PipelineError::InvalidDataset(format!(
                "label {bad} out of range for {} classes",
                class_names.len()
            ))
            .into());
        }
        Ok(Self { texts, labels, class_names })
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    #[cfg(test)]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Row-major (N, C) one-hot label matrix.
    pub fn one_hot_labels(&self) -> Vec<f32> {
        let c = self.num_classes();
        let mut out = vec![0.0f32; self.len() * c];
        for (row, &label) in self.labels.iter().enumerate() {
            out[row * c + label] = 1.0;
        }
        out
    }

    /// Apply `f` to every text, keeping labels aligned.
    pub fn map_texts(self, f: impl Fn(&str) -> String) -> Self {
        let texts = self.texts.iter().map(|t| f(t)).collect();
        Self { texts, ..self }
    }
}
