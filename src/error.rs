// ============================================================
// Pipeline Errors
// ============================================================
// The fatal conditions of a training run. Every layer returns
// anyhow::Result, but the conditions an operator has to tell
// apart are raised as a PipelineError so callers (and tests)
// can recover the exact cause with `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown dataset '{0}' (expected one of: mrpolarity, 20newsgroup, localdata)")]
    UnknownDataset(String),

    #[error("unknown word embedding '{0}' (expected one of: none, word2vec, glove)")]
    UnknownEmbedding(String),

    #[error("configuration section '{0}' is missing")]
    MissingSection(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corpus is empty; cannot build a vocabulary")]
    EmptyCorpus,

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("embedding file '{}' does not exist", .0.display())]
    EmbeddingMissing(PathBuf),

    #[error("embedding file '{}' is malformed at line {line}: {reason}", path.display())]
    EmbeddingMalformed {
        path:   PathBuf,
        line:   usize,
        reason: String,
    },

    #[error("embedding matrix has shape {found:?}, classifier expects {expected:?}")]
    EmbeddingShape {
        expected: [usize; 2],
        found:    [usize; 2],
    },

    #[error("checkpoint directory '{}' is not writable: {reason}", path.display())]
    CheckpointDirUnwritable {
        path:   PathBuf,
        reason: String,
    },

    #[error("interrupted while {0}")]
    Interrupted(String),

    #[error("training loss became non-finite ({loss}) at step {step}")]
    NonFiniteLoss {
        step: usize,
        loss: f64,
    },
}
