// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives any `Classifier + Snapshot` through a stream of batches.
//
//   INIT ──► RUNNING ──► DONE
//              │  ▲
//              ▼  │   step % evaluate_every   == 0
//          EVALUATING
//              │  ▲
//              ▼  │   step % checkpoint_every == 0
//          CHECKPOINTING
//
// For every batch:
//   lr   = schedule.rate(step)
//   step = step + 1 after one blocking train_step
//   log + train summary every REPORT_EVERY steps
//   evaluate on the full dev set (keep_prob 1.0) on cadence
//   snapshot on cadence; the store evicts the oldest
//
// Evaluation and snapshots happen strictly between steps, so a
// snapshot never sees a half-updated parameter set. A stop
// request (Ctrl-C) is honoured at the next batch boundary and
// followed by one immediate snapshot. A non-finite loss aborts
// the run before anything else is written.
//
// TrainingState is owned by the caller and moved in and out;
// nothing here keeps state between runs.
//
// Reference: Burn Book §5 (Training)

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::batcher::Batch;
use crate::domain::{
    encoded::{EmbeddingMatrix, EncodedDataset},
    traits::{Classifier, Snapshot, StepMetrics},
};
use crate::error::PipelineError;
use crate::infra::{
    checkpoint::CheckpointStore,
    metrics::{SummaryRow, SummarySink},
};
use crate::ml::lr_scheduler::LearningRateSchedule;

/// Progress is logged (and summarised) every this many steps.
pub const REPORT_EVERY: usize = 50;

// ─── Settings ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopSettings {
    pub dropout_keep_prob: f64,
    pub evaluate_every:    usize,
    pub checkpoint_every:  usize,
}

// ─── State ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingPhase {
    Init,
    Running,
    Evaluating,
    Checkpointing,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    /// completed optimisation steps
    pub step:        usize,
    /// epoch of the last consumed batch
    pub epoch:       usize,
    pub phase:       TrainingPhase,
    pub last_train:  Option<StepMetrics>,
    pub last_eval:   Option<StepMetrics>,
    /// steps whose snapshots are still retained, oldest first
    pub checkpoints: Vec<usize>,
    pub interrupted: bool,
}

impl TrainingState {
    fn new() -> Self {
        Self {
            step:        0,
            epoch:       0,
            phase:       TrainingPhase::Init,
            last_train:  None,
            last_eval:   None,
            checkpoints: Vec::new(),
            interrupted: false,
        }
    }
}

// ─── TrainingLoop ─────────────────────────────────────────────────────────────
pub struct TrainingLoop {
    settings: LoopSettings,
    schedule: Box<dyn LearningRateSchedule>,
    stop:     Option<Arc<AtomicBool>>,
}

impl TrainingLoop {
    pub fn new(settings: LoopSettings, schedule: Box<dyn LearningRateSchedule>) -> Result<Self> {
        if settings.evaluate_every == 0 || settings.checkpoint_every == 0 {
            return Err(PipelineError::InvalidConfig(
                "evaluate_every and checkpoint_every must be positive".into(),
            )
            .into());
        }
        if !(settings.dropout_keep_prob > 0.0 && settings.dropout_keep_prob <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "dropout_keep_prob must be in (0, 1], got {}",
                settings.dropout_keep_prob
            ))
            .into());
        }
        Ok(Self { settings, schedule, stop: None })
    }

    /// Stop at the next batch boundary once `flag` becomes true.
    pub fn with_stop_signal(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// INIT: optionally seed the classifier's embedding parameter.
    pub fn initialize<C: Classifier>(
        &self,
        classifier: &mut C,
        embedding:  Option<&EmbeddingMatrix>,
    ) -> Result<TrainingState> {
        match embedding {
            Some(matrix) => {
                classifier.assign_embedding(matrix)?;
                tracing::info!(
                    "Pretrained embedding assigned ({} × {})",
                    matrix.vocab_size,
                    matrix.dimension
                );
            }
            None => tracing::warn!(
                "HIGH ALERT: no pretrained embedding configured, training from random initialisation"
            ),
        }
        Ok(TrainingState::new())
    }

    /// RUNNING until the batch stream is exhausted or a stop is requested.
    pub fn run<C, I>(
        &self,
        classifier: &mut C,
        mut state:  TrainingState,
        batches:    I,
        eval:       &EncodedDataset,
        store:      &mut CheckpointStore,
        summaries:  &mut SummarySink,
    ) -> Result<TrainingState>
    where
        C: Classifier + Snapshot,
        I: IntoIterator<Item = Batch>,
    {
        let s = self.settings;
        let mut warned_empty_eval = false;
        state.phase = TrainingPhase::Running;
        tracing::info!("Training with {} learning rate", self.schedule.name());

        for batch in batches {
            if self.stop_requested() {
                state.interrupted = true;
                break;
            }

            let lr      = self.schedule.rate(state.step);
            let metrics = classifier.train_step(&batch.data, s.dropout_keep_prob, lr)?;
            state.step += 1;
            state.epoch = batch.epoch;

            if !metrics.loss.is_finite() {
                tracing::error!("Loss is {} at step {}, aborting", metrics.loss, state.step);
                return Err(PipelineError::NonFiniteLoss { step: state.step, loss: metrics.loss }.into());
            }
            state.last_train = Some(metrics);

            tracing::debug!(
                "step {} (epoch {}, batch {}): loss {:.4}, acc {:.4}, lr {:.6}",
                state.step, batch.epoch, batch.index, metrics.loss, metrics.accuracy, lr
            );
            if state.step % REPORT_EVERY == 0 {
                tracing::info!(
                    "step {:>6} | loss {:.4} | acc {:.4} | lr {:.6}",
                    state.step, metrics.loss, metrics.accuracy, lr
                );
                summaries.train(SummaryRow {
                    step:          state.step,
                    loss:          metrics.loss,
                    accuracy:      metrics.accuracy,
                    learning_rate: Some(lr),
                });
            }

            if state.step % s.evaluate_every == 0 {
                state.phase = TrainingPhase::Evaluating;
                if eval.is_empty() {
                    if !warned_empty_eval {
                        tracing::warn!("Dev set is empty, skipping evaluation");
                        warned_empty_eval = true;
                    }
                } else {
                    let m = classifier.evaluate(eval)?;
                    tracing::info!(
                        "Evaluation at step {}: loss {:.4}, acc {:.4}",
                        state.step, m.loss, m.accuracy
                    );
                    summaries.dev(SummaryRow {
                        step:          state.step,
                        loss:          m.loss,
                        accuracy:      m.accuracy,
                        learning_rate: None,
                    });
                    state.last_eval = Some(m);
                }
                state.phase = TrainingPhase::Running;
            }

            if state.step % s.checkpoint_every == 0 {
                self.checkpoint(classifier, &mut state, store)?;
            }
        }

        if state.interrupted {
            tracing::warn!("Stop requested after step {}", state.step);
            // the cadence may have saved this very step already
            if state.step > 0 && state.step % s.checkpoint_every != 0 {
                self.checkpoint(classifier, &mut state, store)?;
            }
        }

        state.phase = TrainingPhase::Done;
        tracing::info!("Training finished after {} steps", state.step);
        Ok(state)
    }

    fn checkpoint<C: Snapshot>(
        &self,
        classifier: &C,
        state:      &mut TrainingState,
        store:      &mut CheckpointStore,
    ) -> Result<()> {
        state.phase = TrainingPhase::Checkpointing;
        let path = store.save(classifier, state.step)?;
        tracing::info!("Saved model checkpoint to {}", path.display());
        state.checkpoints = store.retained_steps();
        state.phase = TrainingPhase::Running;
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::BatchScheduler;
    use crate::ml::lr_scheduler::{ConstantRate, ExponentialDecay};
    use std::{cell::Cell, fs, path::Path};

    /// Records what the loop asks of it; snapshots are `<stem>.json`.
    #[derive(Default)]
    struct MockClassifier {
        steps:         usize,
        rates:         Vec<f64>,
        keep_probs:    Vec<f64>,
        evaluations:   Cell<usize>,
        assigned:      bool,
        nan_at:        Option<usize>,
        stop_at:       Option<(usize, Arc<AtomicBool>)>,
    }

    impl Classifier for MockClassifier {
        fn train_step(&mut self, _: &EncodedDataset, keep: f64, lr: f64) -> Result<StepMetrics> {
            self.steps += 1;
            self.rates.push(lr);
            self.keep_probs.push(keep);
            if let Some((at, flag)) = &self.stop_at {
                if self.steps == *at {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            let loss = if self.nan_at == Some(self.steps) { f64::NAN } else { 1.0 / self.steps as f64 };
            Ok(StepMetrics { loss, accuracy: 0.5 })
        }

        fn evaluate(&self, _: &EncodedDataset) -> Result<StepMetrics> {
            self.evaluations.set(self.evaluations.get() + 1);
            Ok(StepMetrics { loss: 0.3, accuracy: 0.9 })
        }

        fn assign_embedding(&mut self, matrix: &EmbeddingMatrix) -> Result<()> {
            if matrix.dimension != 3 {
                return Err(PipelineError::EmbeddingShape { expected: [matrix.vocab_size, 3], found: matrix.shape() }.into());
            }
            self.assigned = true;
            Ok(())
        }
    }

    impl Snapshot for MockClassifier {
        fn save_snapshot(&self, stem: &Path) -> Result<()> {
            fs::write(stem.with_extension("json"), self.steps.to_string())?;
            Ok(())
        }
    }

    /// 18 rows × batch 4 → 5 batches per epoch
    fn train_rows() -> EncodedDataset {
        let ids    = (0..18 * 3).map(|v| v as u32 % 7).collect();
        let labels = (0..18).flat_map(|i| if i % 2 == 0 { [1.0, 0.0] } else { [0.0, 1.0] }).collect();
        EncodedDataset::new(ids, labels, 3, 2).unwrap()
    }

    fn dev_rows() -> EncodedDataset {
        EncodedDataset::new(vec![1, 2, 3, 4, 5, 6], vec![1.0, 0.0, 0.0, 1.0], 3, 2).unwrap()
    }

    fn settings(evaluate_every: usize, checkpoint_every: usize) -> LoopSettings {
        LoopSettings { dropout_keep_prob: 0.5, evaluate_every, checkpoint_every }
    }

    fn snapshot_steps(store: &CheckpointStore) -> Vec<usize> {
        let mut steps: Vec<usize> = fs::read_dir(store.checkpoint_dir())
            .unwrap()
            .filter_map(|e| {
                let name = e.unwrap().file_name().to_string_lossy().into_owned();
                name.strip_prefix("model-")?.strip_suffix(".json")?.parse().ok()
            })
            .collect();
        steps.sort();
        steps
    }

    #[test]
    fn test_450_steps_checkpoint_at_200_and_400() {
        let root      = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(root.path(), "mrpolarity", "none", 5).unwrap();
        let data      = train_rows();
        let scheduler = BatchScheduler::new(4, 90).unwrap().with_seed(1);
        assert_eq!(scheduler.total_batches(data.len()), 450);

        let lp    = TrainingLoop::new(settings(100, 200), Box::new(ConstantRate::new(0.0005))).unwrap();
        let mut c = MockClassifier::default();
        let state = lp.initialize(&mut c, None).unwrap();
        let state = lp
            .run(&mut c, state, scheduler.iterate(&data), &dev_rows(), &mut store, &mut SummarySink::default())
            .unwrap();

        assert_eq!(state.step, 450);
        assert_eq!(state.epoch, 89);
        assert_eq!(state.phase, TrainingPhase::Done);
        assert_eq!(state.checkpoints, vec![200, 400]);
        assert_eq!(snapshot_steps(&store), vec![200, 400]);
        assert_eq!(c.evaluations.get(), 4);
        assert!(c.keep_probs.iter().all(|&k| k == 0.5));
        assert!(!state.interrupted);
    }

    #[test]
    fn test_retention_limit_respected() {
        let root      = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(root.path(), "d", "e", 2).unwrap();
        let data      = train_rows();
        let scheduler = BatchScheduler::new(4, 10).unwrap();

        let lp    = TrainingLoop::new(settings(1000, 10), Box::new(ConstantRate::new(0.1))).unwrap();
        let mut c = MockClassifier::default();
        let state = lp.initialize(&mut c, None).unwrap();
        let state = lp
            .run(&mut c, state, scheduler.iterate(&data), &dev_rows(), &mut store, &mut SummarySink::default())
            .unwrap();

        assert_eq!(state.step, 50);
        assert_eq!(state.checkpoints, vec![40, 50]);
        assert_eq!(snapshot_steps(&store), vec![40, 50]);
    }

    #[test]
    fn test_schedule_consulted_with_step_before_increment() {
        let root      = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(root.path(), "d", "e", 1).unwrap();
        let data      = train_rows();
        let scheduler = BatchScheduler::new(4, 2).unwrap();

        let decay = ExponentialDecay::new(0.005, 0.0001, 5.0);
        let lp    = TrainingLoop::new(settings(1000, 1000), Box::new(decay)).unwrap();
        let mut c = MockClassifier::default();
        let state = lp.initialize(&mut c, None).unwrap();
        lp.run(&mut c, state, scheduler.iterate(&data), &dev_rows(), &mut store, &mut SummarySink::default())
            .unwrap();

        assert_eq!(c.rates.len(), 10);
        assert_eq!(c.rates[0], decay.rate(0));
        assert!(c.rates.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_non_finite_loss_aborts_before_next_checkpoint() {
        let root      = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(root.path(), "d", "e", 10).unwrap();
        let data      = train_rows();
        let scheduler = BatchScheduler::new(4, 3).unwrap();

        let lp    = TrainingLoop::new(settings(1000, 1), Box::new(ConstantRate::new(0.1))).unwrap();
        let mut c = MockClassifier { nan_at: Some(3), ..Default::default() };
        let state = lp.initialize(&mut c, None).unwrap();
        let err   = lp
            .run(&mut c, state, scheduler.iterate(&data), &dev_rows(), &mut store, &mut SummarySink::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NonFiniteLoss { step: 3, .. })
        ));
        assert_eq!(c.steps, 3);
        assert_eq!(snapshot_steps(&store), vec![1, 2]);
    }

    #[test]
    fn test_stop_request_checkpoints_immediately() {
        let root      = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(root.path(), "d", "e", 5).unwrap();
        let data      = train_rows();
        let scheduler = BatchScheduler::new(4, 10).unwrap();
        let flag      = Arc::new(AtomicBool::new(false));

        let lp = TrainingLoop::new(settings(1000, 5), Box::new(ConstantRate::new(0.1)))
            .unwrap()
            .with_stop_signal(flag.clone());
        let mut c = MockClassifier { stop_at: Some((7, flag)), ..Default::default() };
        let state = lp.initialize(&mut c, None).unwrap();
        let state = lp
            .run(&mut c, state, scheduler.iterate(&data), &dev_rows(), &mut store, &mut SummarySink::default())
            .unwrap();

        assert!(state.interrupted);
        assert_eq!(state.step, 7);
        assert_eq!(c.steps, 7);
        assert_eq!(state.checkpoints, vec![5, 7]);
        assert_eq!(state.phase, TrainingPhase::Done);
    }

    #[test]
    fn test_stop_overwrites_snapshot_left_by_earlier_run() {
        let root = tempfile::tempdir().unwrap();
        {
            let mut earlier = CheckpointStore::open(root.path(), "d", "e", 5).unwrap();
            earlier.save(&MockClassifier { steps: 99, ..Default::default() }, 3).unwrap();
        }
        let mut store = CheckpointStore::open(root.path(), "d", "e", 5).unwrap();
        let data      = train_rows();
        let scheduler = BatchScheduler::new(4, 10).unwrap();
        let flag      = Arc::new(AtomicBool::new(false));

        let lp = TrainingLoop::new(settings(1000, 100), Box::new(ConstantRate::new(0.1)))
            .unwrap()
            .with_stop_signal(flag.clone());
        let mut c = MockClassifier { stop_at: Some((3, flag)), ..Default::default() };
        let state = lp.initialize(&mut c, None).unwrap();
        let state = lp
            .run(&mut c, state, scheduler.iterate(&data), &dev_rows(), &mut store, &mut SummarySink::default())
            .unwrap();

        assert_eq!(state.checkpoints, vec![3]);
        let written = fs::read_to_string(root.path().join("d/e/checkpoints/model-3.json")).unwrap();
        assert_eq!(written, "3");
    }

    #[test]
    fn test_empty_dev_set_skips_evaluation() {
        let root      = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(root.path(), "d", "e", 1).unwrap();
        let data      = train_rows();
        let empty     = data.empty_like();
        let scheduler = BatchScheduler::new(4, 2).unwrap();

        let lp    = TrainingLoop::new(settings(2, 1000), Box::new(ConstantRate::new(0.1))).unwrap();
        let mut c = MockClassifier::default();
        let state = lp.initialize(&mut c, None).unwrap();
        let state = lp
            .run(&mut c, state, scheduler.iterate(&data), &empty, &mut store, &mut SummarySink::default())
            .unwrap();

        assert_eq!(state.step, 10);
        assert_eq!(c.evaluations.get(), 0);
        assert!(state.last_eval.is_none());
    }

    #[test]
    fn test_summaries_written_on_report_cadence() {
        let root      = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(root.path(), "d", "e", 1).unwrap();
        let mut sink  = SummarySink::open(&store.summary_dir("train"), &store.summary_dir("dev"));
        let data      = train_rows();
        let scheduler = BatchScheduler::new(4, 20).unwrap();

        let lp    = TrainingLoop::new(settings(25, 1000), Box::new(ConstantRate::new(0.1))).unwrap();
        let mut c = MockClassifier::default();
        let state = lp.initialize(&mut c, None).unwrap();
        lp.run(&mut c, state, scheduler.iterate(&data), &dev_rows(), &mut store, &mut sink)
            .unwrap();

        let train = fs::read_to_string(store.summary_dir("train").join("metrics.csv")).unwrap();
        let dev   = fs::read_to_string(store.summary_dir("dev").join("metrics.csv")).unwrap();
        // header + steps 50, 100
        assert_eq!(train.lines().count(), 3);
        // header + steps 25, 50, 75, 100
        assert_eq!(dev.lines().count(), 5);
    }

    #[test]
    fn test_initialize_assigns_or_fails_loudly() {
        let lp    = TrainingLoop::new(settings(1, 1), Box::new(ConstantRate::new(0.1))).unwrap();
        let mut c = MockClassifier::default();

        let state = lp.initialize(&mut c, None).unwrap();
        assert_eq!(state.phase, TrainingPhase::Init);
        assert!(!c.assigned);

        let good = EmbeddingMatrix { vocab_size: 2, dimension: 3, values: vec![0.0; 6] };
        lp.initialize(&mut c, Some(&good)).unwrap();
        assert!(c.assigned);

        let bad = EmbeddingMatrix { vocab_size: 2, dimension: 4, values: vec![0.0; 8] };
        assert!(lp.initialize(&mut c, Some(&bad)).is_err());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let rate = || Box::new(ConstantRate::new(0.1)) as Box<dyn LearningRateSchedule>;
        assert!(TrainingLoop::new(settings(0, 1), rate()).is_err());
        assert!(TrainingLoop::new(settings(1, 0), rate()).is_err());
        let no_keep = LoopSettings { dropout_keep_prob: 0.0, evaluate_every: 1, checkpoint_every: 1 };
        assert!(TrainingLoop::new(no_keep, rate()).is_err());
    }
}
