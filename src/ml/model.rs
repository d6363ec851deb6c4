// ============================================================
// Layer 5 — TextCNN
// ============================================================
// Sentence classifier with one convolution per filter size:
//
//   input ids      [batch, seq_len]
//        │ embedding
//        ▼
//   [batch, seq_len, embed]  → swap → [batch, embed, seq_len]
//        │ Conv1d(k) + ReLU for every k in filter_sizes
//        ▼
//   [batch, num_filters, seq_len - k + 1]
//        │ max over time
//        ▼
//   [batch, num_filters]  × len(filter_sizes)  → concat
//        │ dropout(keep_prob)
//        ▼
//   linear → logits [batch, num_classes]
//
// Loss is softmax cross-entropy against the target class plus
// λ · ½‖W‖² on the output layer only.
//
// Dropout is burn's own layer, built per call from keep_prob.
// It only fires on an autodiff backend, so the inner backend
// used for evaluation always sees the full activations.
//
// Reference: Kim (2014) Convolutional Neural Networks for
//            Sentence Classification
//            Burn Book §3 (Building Blocks)

use anyhow::Result;
use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        loss::CrossEntropyLossConfig,
        DropoutConfig, Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::relu, ElementConversion},
};

use crate::error::PipelineError;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct TextCnnConfig {
    pub sequence_length: usize,
    pub num_classes:     usize,
    pub vocab_size:      usize,
    pub embedding_size:  usize,
    pub filter_sizes:    Vec<usize>,
    pub num_filters:     usize,
    #[config(default = 0.0)]
    pub l2_reg_lambda: f64,
}

impl TextCnnConfig {
    /// Every filter has to fit inside one document.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg).into());

        if self.filter_sizes.is_empty() || self.filter_sizes.contains(&0) {
            return invalid(format!("filter sizes must be positive, got {:?}", self.filter_sizes));
        }
        if let Some(&k) = self.filter_sizes.iter().find(|&&k| k > self.sequence_length) {
            return invalid(format!(
                "filter size {k} is wider than the document length {}",
                self.sequence_length
            ));
        }
        if self.num_classes == 0 || self.vocab_size == 0 || self.embedding_size == 0 || self.num_filters == 0 {
            return invalid("num_classes, vocab_size, embedding_size and num_filters must be positive".into());
        }
        if self.l2_reg_lambda < 0.0 {
            return invalid(format!("l2_reg_lambda must be >= 0, got {}", self.l2_reg_lambda));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> TextCnn<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embedding_size)
            .with_initializer(Initializer::Uniform { min: -1.0, max: 1.0 })
            .init(device);
        let convs = self
            .filter_sizes
            .iter()
            .map(|&k| Conv1dConfig::new(self.embedding_size, self.num_filters, k).init(device))
            .collect();
        let output = LinearConfig::new(self.num_filters * self.filter_sizes.len(), self.num_classes)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);

        TextCnn { embedding, convs, output, l2_reg_lambda: self.l2_reg_lambda }
    }
}

#[derive(Module, Debug)]
pub struct TextCnn<B: Backend> {
    pub embedding:     Embedding<B>,
    pub convs:         Vec<Conv1d<B>>,
    pub output:        Linear<B>,
    pub l2_reg_lambda: f64,
}

impl<B: Backend> TextCnn<B> {
    /// input_ids: [batch, seq_len] → logits: [batch, num_classes]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, dropout_keep_prob: f64) -> Tensor<B, 2> {
        let [batch_size, _] = input_ids.dims();

        // Conv1d wants channels first
        let embedded = self.embedding.forward(input_ids).swap_dims(1, 2);

        let pooled: Vec<Tensor<B, 2>> = self
            .convs
            .iter()
            .map(|conv| {
                let features = relu(conv.forward(embedded.clone()));
                let [_, filters, _] = features.dims();
                features.max_dim(2).reshape([batch_size, filters])
            })
            .collect();

        let features = Tensor::cat(pooled, 1);
        let dropout  = DropoutConfig::new(1.0 - dropout_keep_prob).init();
        self.output.forward(dropout.forward(features))
    }

    /// Mean cross-entropy over the batch plus the L2 term.
    /// targets: [batch] class indices
    pub fn loss(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let cross_entropy = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, targets);
        cross_entropy + self.l2_penalty() * self.l2_reg_lambda
    }

    fn l2_penalty(&self) -> Tensor<B, 1> {
        let mut penalty = self.output.weight.val().powf_scalar(2.0).sum() / 2.0;
        if let Some(bias) = &self.output.bias {
            penalty = penalty + bias.val().powf_scalar(2.0).sum() / 2.0;
        }
        penalty
    }
}

/// Fraction of rows whose arg-max logit is the target class.
pub fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f64 {
    let [rows, _] = logits.dims();
    if rows == 0 {
        return 0.0;
    }
    // argmax(1) is [batch, 1]; flatten to [batch] before comparing
    let correct = logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<f64>();
    correct / rows as f64
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::AutodiffModule;

    type TestBackend = NdArray;

    fn config() -> TextCnnConfig {
        TextCnnConfig::new(5, 3, 10, 4, vec![2, 3], 6)
    }

    fn ids<B: Backend>(device: &B::Device) -> Tensor<B, 2, Int> {
        Tensor::from_data(
            TensorData::new(vec![1i64, 2, 3, 0, 0, 4, 5, 6, 7, 8], [2, 5]),
            device,
        )
    }

    fn values<B: Backend>(t: Tensor<B, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: TextCnn<TestBackend> = config().init(&device);
        let logits = model.forward(ids(&device), 1.0);
        assert_eq!(logits.dims(), [2, 3]);
    }

    #[test]
    fn test_keep_prob_applies_only_while_training() {
        type Train = Autodiff<NdArray>;
        let device = Default::default();
        let model: TextCnn<Train> = config().init(&device);

        // keep_prob 1.0 is the identity, so two passes agree exactly
        let full  = values(model.forward(ids(&device), 1.0));
        assert_eq!(full, values(model.forward(ids(&device), 1.0)));

        // keep_prob 0.5 drops and rescales pooled features
        let dropped = values(model.forward(ids(&device), 0.5));
        assert_ne!(full, dropped);

        // the inner backend never drops
        let inner = model.valid();
        assert_eq!(
            values(inner.forward(ids(&device), 0.5)),
            values(inner.forward(ids(&device), 1.0))
        );
    }

    #[test]
    fn test_loss_is_positive_and_finite() {
        let device = Default::default();
        let model: TextCnn<TestBackend> = config().with_l2_reg_lambda(0.1).init(&device);
        let targets = Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(vec![1i64, 2], [2]), &device);
        let loss = model
            .loss(model.forward(ids(&device), 1.0), targets)
            .into_scalar()
            .elem::<f64>();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_l2_term_adds_to_loss() {
        let device = Default::default();
        let model: TextCnn<TestBackend> = config().init(&device);
        let regularised = TextCnn { l2_reg_lambda: 1.0, ..model.clone() };
        let targets = || Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(vec![0i64, 1], [2]), &device);

        let plain = model.loss(model.forward(ids(&device), 1.0), targets()).into_scalar().elem::<f64>();
        let with  = regularised
            .loss(regularised.forward(ids(&device), 1.0), targets())
            .into_scalar()
            .elem::<f64>();
        assert!(with > plain);
    }

    #[test]
    fn test_accuracy_counts_argmax_hits() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![2.0f32, 1.0, 0.0, 3.0], [2, 2]),
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_data(TensorData::new(vec![0i64, 0], [2]), &device);
        assert_eq!(accuracy(logits, targets), 0.5);
    }

    #[test]
    fn test_validate_rejects_wide_filters() {
        let cfg = TextCnnConfig::new(3, 2, 10, 4, vec![3, 4, 5], 2);
        assert!(cfg.validate().is_err());
        assert!(TextCnnConfig::new(5, 2, 10, 4, vec![3, 4, 5], 2).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_l2() {
        assert!(config().with_l2_reg_lambda(-1.0).validate().is_err());
    }
}
