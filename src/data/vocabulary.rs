// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Maps whitespace tokens to integer ids and turns each text
// into a fixed-length row of ids.
//
//   id 0         → padding and unknown tokens
//   id 1, 2, ... → tokens in the order they are first seen
//
// `max_document_length` is the largest token count in the fit
// corpus; every transformed row is right-padded with 0 or
// truncated to exactly that length.
//
// A Vocabulary is frozen once `fit` returns: there is no API
// to add tokens afterwards, so the same instance can transform
// training text and, later, text seen only at inference time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::corpus::Corpus;
use crate::domain::encoded::EncodedDataset;
use crate::error::PipelineError;

pub const UNKNOWN_TOKEN: &str = "<UNK>";
pub const PAD_ID: u32 = 0;

/// On-disk form: the id → token table plus the document length.
#[derive(Serialize, Deserialize)]
struct VocabularyRecord {
    max_document_length: usize,
    tokens:              Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "VocabularyRecord", into = "VocabularyRecord")]
pub struct Vocabulary {
    max_document_length: usize,
    /// index = id
    tokens: Vec<String>,
    ids:    HashMap<String, u32>,
}

impl From<VocabularyRecord> for Vocabulary {
    fn from(r: VocabularyRecord) -> Self {
        let ids = r
            .tokens
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { max_document_length: r.max_document_length, tokens: r.tokens, ids }
    }
}

impl From<Vocabulary> for VocabularyRecord {
    fn from(v: Vocabulary) -> Self {
        Self { max_document_length: v.max_document_length, tokens: v.tokens }
    }
}

impl Vocabulary {
    /// Build the vocabulary from `texts`. Deterministic for a given
    /// iteration order of the input.
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Result<Self> {
        let max_document_length = texts
            .iter()
            .map(|t| t.as_ref().split_whitespace().count())
            .max()
            .ok_or(PipelineError::EmptyCorpus)?;
        if max_document_length == 0 {
            return Err(PipelineError::InvalidDataset(
                "every text is empty after tokenisation".into(),
            )
            .into());
        }

        let mut tokens = vec![UNKNOWN_TOKEN.to_string()];
        let mut ids    = HashMap::new();
        for text in texts {
            for token in text.as_ref().split_whitespace() {
                if !ids.contains_key(token) {
                    ids.insert(token.to_string(), tokens.len() as u32);
                    tokens.push(token.to_string());
                }
            }
        }

        Ok(Self { max_document_length, tokens, ids })
    }

    /// Token ids for `text`, padded/truncated to `max_document_length`.
    /// Tokens never seen during `fit` map to id 0.
    pub fn transform(&self, text: &str) -> Vec<u32> {
        let mut row: Vec<u32> = text
            .split_whitespace()
            .take(self.max_document_length)
            .map(|t| self.ids.get(t).copied().unwrap_or(PAD_ID))
            .collect();
        row.resize(self.max_document_length, PAD_ID);
        row
    }

    /// Encode a whole corpus into an (N, max_document_length) id matrix
    /// paired with its (N, C) one-hot label matrix.
    pub fn encode(&self, corpus: &Corpus) -> Result<EncodedDataset> {
        let ids = corpus
            .texts()
            .iter()
            .flat_map(|t| self.transform(t))
            .collect();
        EncodedDataset::new(
            ids,
            corpus.one_hot_labels(),
            self.max_document_length,
            corpus.num_classes(),
        )
    }

    /// Number of ids, including the reserved id 0.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn max_document_length(&self) -> usize {
        self.max_document_length
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))
    }

    #[cfg(test)]
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vocabulary from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}
