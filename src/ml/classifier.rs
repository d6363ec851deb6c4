// ============================================================
// Layer 5 — Burn Classifier Adapter
// ============================================================
// Puts the burn TextCnn behind the framework-free `Classifier`
// and `Snapshot` traits the training loop is written against.
//
//   train_step  EncodedDataset → TextCnnBatcher → forward(keep_prob)
//               → loss → backward → SGD step
//   evaluate    model.valid() on the inner backend, keep_prob = 1.0
//   snapshot    CompactRecorder → <stem>.mpk.gz
//
// Training uses B (Autodiff<...>) for gradients; evaluation uses
// B::InnerBackend, which shares the same device.
//
// Reference: Burn Book §5 (Training, Records)

use std::path::Path;

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::{AutodiffModule, Param},
    optim::{GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::{backend::AutodiffBackend, ElementConversion},
};

use crate::data::batcher::{items, TextCnnBatch, TextCnnBatcher};
use crate::domain::{
    encoded::{EmbeddingMatrix, EncodedDataset},
    traits::{Classifier, Snapshot, StepMetrics},
};
use crate::error::PipelineError;
use crate::ml::model::{accuracy, TextCnn, TextCnnConfig};

// ─── Backend selection ────────────────────────────────────────────────────────
// CPU by default so the trainer runs anywhere; `--features wgpu` for GPU.
#[cfg(not(feature = "wgpu"))]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
#[cfg(feature = "wgpu")]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub struct BurnClassifier<B: AutodiffBackend, O> {
    model:         TextCnn<B>,
    optim:         O,
    device:        B::Device,
    train_batcher: TextCnnBatcher<B>,
    eval_batcher:  TextCnnBatcher<B::InnerBackend>,
}

/// Build a fresh TextCnn driven by plain stochastic gradient descent.
pub fn sgd_classifier<B: AutodiffBackend>(
    config: &TextCnnConfig,
    device: &B::Device,
) -> Result<BurnClassifier<B, impl Optimizer<TextCnn<B>, B>>> {
    config.validate()?;
    let model = config.init::<B>(device);
    tracing::info!(
        "TextCNN ready: {} parameters, filters {:?} × {}",
        model.num_params(),
        config.filter_sizes,
        config.num_filters
    );
    let optim = SgdConfig::new().init::<B, TextCnn<B>>();
    Ok(BurnClassifier::new(model, optim, device.clone()))
}

impl<B: AutodiffBackend, O> BurnClassifier<B, O> {
    pub fn new(model: TextCnn<B>, optim: O, device: B::Device) -> Self {
        Self {
            model,
            optim,
            train_batcher: TextCnnBatcher::new(device.clone()),
            eval_batcher:  TextCnnBatcher::new(device.clone()),
            device,
        }
    }

    #[cfg(test)]
    pub fn model(&self) -> &TextCnn<B> {
        &self.model
    }
}

impl<B, O> Classifier for BurnClassifier<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<TextCnn<B>, B>,
{
    fn train_step(
        &mut self,
        batch:             &EncodedDataset,
        dropout_keep_prob: f64,
        learning_rate:     f64,
    ) -> Result<StepMetrics> {
        let batch = to_batch(&self.train_batcher, batch)?;

        let logits   = self.model.forward(batch.input_ids, dropout_keep_prob);
        let accuracy = accuracy(logits.clone(), batch.targets.clone());
        let loss     = self.model.loss(logits, batch.targets);
        let loss_val = loss.clone().into_scalar().elem::<f64>();

        // leave the parameters untouched; the loop aborts on this
        if !loss_val.is_finite() {
            return Ok(StepMetrics { loss: loss_val, accuracy });
        }

        let grads  = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self.optim.step(learning_rate, self.model.clone(), grads);

        Ok(StepMetrics { loss: loss_val, accuracy })
    }

    fn evaluate(&self, data: &EncodedDataset) -> Result<StepMetrics> {
        let model = self.model.valid();
        let batch = to_batch(&self.eval_batcher, data)?;

        let logits   = model.forward(batch.input_ids, 1.0);
        let accuracy = accuracy(logits.clone(), batch.targets.clone());
        let loss     = model.loss(logits, batch.targets).into_scalar().elem::<f64>();

        Ok(StepMetrics { loss, accuracy })
    }

    fn assign_embedding(&mut self, matrix: &EmbeddingMatrix) -> Result<()> {
        let expected = self.model.embedding.weight.val().dims();
        let found    = matrix.shape();
        if expected != found {
            return Err(PipelineError::EmbeddingShape { expected, found }.into());
        }

        let weight = Tensor::<B, 2>::from_data(
            TensorData::new(matrix.values.clone(), found),
            &self.device,
        );
        self.model.embedding.weight = Param::from_tensor(weight);
        Ok(())
    }
}

impl<B: AutodiffBackend, O> Snapshot for BurnClassifier<B, O> {
    fn save_snapshot(&self, stem: &Path) -> Result<()> {
        CompactRecorder::new()
            .record(self.model.clone().into_record(), stem.to_path_buf())
            .with_context(|| format!("Cannot write snapshot '{}'", stem.display()))?;
        Ok(())
    }
}

fn to_batch<BB: Backend>(batcher: &TextCnnBatcher<BB>, data: &EncodedDataset) -> Result<TextCnnBatch<BB>> {
    if data.is_empty() {
        return Err(PipelineError::InvalidDataset("cannot build tensors from zero rows".into()).into());
    }
    Ok(batcher.batch(items(data)))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn config() -> TextCnnConfig {
        // seq_len 4, 2 classes, vocab 6, embed 3, filters [2, 3] × 2
        TextCnnConfig::new(4, 2, 6, 3, vec![2, 3], 2)
    }

    fn batch() -> EncodedDataset {
        EncodedDataset::new(
            vec![1, 2, 0, 0, 3, 4, 5, 0, 1, 1, 2, 0, 4, 5, 5, 3],
            vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0],
            4,
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_train_step_reports_finite_metrics() {
        let device = Default::default();
        let mut clf = sgd_classifier::<TestBackend>(&config(), &device).unwrap();
        let m = clf.train_step(&batch(), 0.5, 0.01).unwrap();
        assert!(m.loss.is_finite());
        assert!((0.0..=1.0).contains(&m.accuracy));
    }

    #[test]
    fn test_repeated_steps_reduce_loss() {
        let device = Default::default();
        let mut clf = sgd_classifier::<TestBackend>(&config(), &device).unwrap();
        let data    = batch();
        let before  = clf.evaluate(&data).unwrap().loss;
        for _ in 0..100 {
            clf.train_step(&data, 1.0, 0.1).unwrap();
        }
        let after = clf.evaluate(&data).unwrap().loss;
        assert!(after < before, "loss went from {before} to {after}");
    }

    #[test]
    fn test_evaluate_leaves_parameters_alone() {
        let device = Default::default();
        let clf    = sgd_classifier::<TestBackend>(&config(), &device).unwrap();
        let first  = clf.evaluate(&batch()).unwrap();
        let second = clf.evaluate(&batch()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_embedding_assignment_is_shape_checked() {
        let device = Default::default();
        let mut clf = sgd_classifier::<TestBackend>(&config(), &device).unwrap();

        let wrong = EmbeddingMatrix { vocab_size: 6, dimension: 4, values: vec![0.0; 24] };
        let err   = clf.assign_embedding(&wrong).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmbeddingShape { expected: [6, 3], found: [6, 4] })
        ));

        let values: Vec<f32> = (0..18).map(|v| v as f32 / 10.0).collect();
        let right = EmbeddingMatrix { vocab_size: 6, dimension: 3, values: values.clone() };
        clf.assign_embedding(&right).unwrap();
        let stored = clf.model().embedding.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(stored, values);
    }

    #[test]
    fn test_snapshot_written_next_to_stem() {
        let device = Default::default();
        let clf    = sgd_classifier::<TestBackend>(&config(), &device).unwrap();
        let dir    = tempfile::tempdir().unwrap();
        clf.save_snapshot(&dir.path().join("model-1")).unwrap();

        let written: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with("model-1."));
    }

    #[test]
    fn test_wide_filter_rejected_at_construction() {
        let device = Default::default();
        let cfg    = TextCnnConfig::new(2, 2, 6, 3, vec![3], 2);
        assert!(sgd_classifier::<TestBackend>(&cfg, &device).is_err());
    }
}
