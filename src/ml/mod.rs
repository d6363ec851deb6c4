// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The model and its classifier adapter are the burn side here
// (tensor batching sits in data/batcher.rs). The training loop and
// the learning-rate schedules only see the traits from Layer 3,
// so they are testable without any tensor backend.
//
//   model.rs        — TextCnn: embedding, one Conv1d per filter
//                     size, max-over-time pooling, dropout, linear
//                     head; burn cross-entropy + L2 loss
//
//   classifier.rs   — BurnClassifier: TextCnn + SGD behind the
//                     Classifier / Snapshot traits
//
//   lr_scheduler.rs — constant and exponentially decaying rates
//
//   trainer.rs      — TrainingLoop state machine: steps, reporting,
//                     evaluation, checkpointing, stop + NaN guards
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Kim (2014) Convolutional Neural Networks for
//            Sentence Classification

/// TextCNN architecture
pub mod model;

/// Burn-backed Classifier implementation
pub mod classifier;

pub mod lr_scheduler;

/// Training loop with evaluation and checkpointing
pub mod trainer;
