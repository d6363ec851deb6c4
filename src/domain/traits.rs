// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the training pipeline and its
// collaborators. No burn types appear here: the training loop
// is written against these traits, and the burn TextCNN in
// Layer 5 is one implementation of them.
//
//   CorpusSource → every dataset variant (mrpolarity, ...)
//   Classifier   → anything that can take an optimisation step
//   Snapshot     → anything whose parameters can be persisted

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::corpus::Corpus;
use crate::domain::encoded::{EmbeddingMatrix, EncodedDataset};

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// A named corpus that can be loaded into memory.
pub trait CorpusSource {
    /// Load every (text, label) pair of this source.
    fn load(&self) -> Result<Corpus>;
}

// ─── StepMetrics ──────────────────────────────────────────────────────────────
/// Loss and accuracy reported by one classifier call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub loss:     f64,
    pub accuracy: f64,
}

// ─── Classifier ───────────────────────────────────────────────────────────────
/// The tensor-level contract the training loop drives.
pub trait Classifier {
    /// One forward/backward/update on a batch. Blocks until the
    /// parameters are fully updated.
    fn train_step(
        &mut self,
        batch:             &EncodedDataset,
        dropout_keep_prob: f64,
        learning_rate:     f64,
    ) -> Result<StepMetrics>;

    /// Forward-only pass with dropout disabled. Never mutates parameters.
    fn evaluate(&self, data: &EncodedDataset) -> Result<StepMetrics>;

    /// Replace the embedding parameter with a (vocab_size × embedding_size)
    /// matrix. Fails on a shape mismatch.
    fn assign_embedding(&mut self, matrix: &EmbeddingMatrix) -> Result<()>;
}

// ─── Snapshot ─────────────────────────────────────────────────────────────────
/// Point-in-time persistence of model parameters.
pub trait Snapshot {
    /// Write the current parameters next to `stem`. The implementation may
    /// append its own file extension to `stem`.
    fn save_snapshot(&self, stem: &Path) -> Result<()>;
}
