// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles the encoded dataset once with a fixed seed, then
// cuts it into a training prefix and a validation tail:
//
//   eval_count = floor(validation_fraction × N)
//   Train      = rows [0, N - eval_count)
//   Eval       = rows [N - eval_count, N)
//
// The seed makes the permutation reproducible: same seed and
// same N give the same permutation on every run, so the
// validation set never leaks into training across restarts.
//
// validation_fraction must lie strictly inside (0, 1); anything
// else is rejected rather than clamped.
//
// Reference: rand crate documentation (SeedableRng, SliceRandom)

use anyhow::Result;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::encoded::EncodedDataset;
use crate::error::PipelineError;

/// Immutable result of a split. Both halves keep the same row widths.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: EncodedDataset,
    pub eval:  EncodedDataset,
}

/// A uniform random permutation of `0..n`, fully determined by `seed`.
pub fn permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut rng     = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Reorder every row of `dataset` by `permutation(len, seed)`.
pub fn shuffle(dataset: &EncodedDataset, seed: u64) -> EncodedDataset {
    dataset.select(&permutation(dataset.len(), seed))
}

/// Number of validation rows for `n` examples.
pub fn eval_count(n: usize, validation_fraction: f64) -> usize {
    (validation_fraction * n as f64).floor() as usize
}

/// Cut an already shuffled dataset into train prefix and eval tail.
pub fn split(shuffled: EncodedDataset, validation_fraction: f64) -> Result<Split> {
    if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "validation fraction must be in (0, 1), got {validation_fraction}"
        ))
        .into());
    }

    let total    = shuffled.len();
    let eval_n   = eval_count(total, validation_fraction);
    let (train, eval) = shuffled.split_at(total - eval_n);

    if eval.is_empty() {
        tracing::warn!(
            "Validation set is empty ({} examples × {}); evaluation will be skipped",
            total,
            validation_fraction
        );
    }
    tracing::debug!("Dataset split: {} training, {} validation", train.len(), eval.len());

    Ok(Split { train, eval })
}
