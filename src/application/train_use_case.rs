// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Runs the training pipeline as a straight line of stages, each
// taking the previous stage's output:
//
//   Step 1: Validate flags                   (Layer 2)
//   Step 2: Resolve config.yml selectors     (Layer 6 - infra)
//   Step 3: Open the run directory           (Layer 6 - infra)
//   Step 4: Load + clean the corpus          (Layer 4 - data)
//   Step 5: Fit vocabulary, encode           (Layer 4 - data)
//   Step 6: Shuffle + train/dev split        (Layer 4 - data)
//   Step 7: Load pretrained embedding        (Layer 6 - infra)
//   Step 8: Save vocabulary + config         (Layer 6 - infra)
//   Step 9: Build TextCNN, run training loop (Layer 5 - ml)
//
// Every fatal condition stops the pipeline where it is detected:
// an unknown dataset before any directory exists, a missing
// embedding file before the first training step.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::BatchScheduler,
    preprocessor::Preprocessor,
    splitter::{self, Split},
    vocabulary::Vocabulary,
};
use crate::domain::traits::CorpusSource;
use crate::error::PipelineError;
use crate::infra::{
    checkpoint::CheckpointStore,
    config::{DatasetSource, PipelineFile},
    metrics::SummarySink,
};
use crate::ml::{
    classifier::{sgd_classifier, TrainBackend},
    lr_scheduler::{decay_speed, LearningRatePolicy},
    model::TextCnnConfig,
    trainer::{LoopSettings, TrainingLoop, TrainingState},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every hyperparameter of a run. Immutable once built; saved as
// train_config.json next to the vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub config:                 PathBuf,
    pub runs_dir:               PathBuf,
    pub dev_sample_percentage:  f64,
    pub enable_word_embeddings: bool,
    pub embedding_dim:          usize,
    pub filter_sizes:           Vec<usize>,
    pub num_filters:            usize,
    pub dropout_keep_prob:      f64,
    pub l2_reg_lambda:          f64,
    pub batch_size:             usize,
    pub num_epochs:             usize,
    pub evaluate_every:         usize,
    pub checkpoint_every:       usize,
    pub num_checkpoints:        usize,
    pub decay_coefficient:      f64,
    pub shuffle_seed:           u64,
    pub learning_rate:          f64,
    pub lr_decay:               bool,
    pub max_learning_rate:      f64,
    pub min_learning_rate:      f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            config:                 "config.yml".into(),
            runs_dir:               "runs".into(),
            dev_sample_percentage:  0.1,
            enable_word_embeddings: true,
            embedding_dim:          300,
            filter_sizes:           vec![3, 4, 5],
            num_filters:            128,
            dropout_keep_prob:      1.0,
            l2_reg_lambda:          0.0,
            batch_size:             32,
            num_epochs:             300,
            evaluate_every:         200,
            checkpoint_every:       200,
            num_checkpoints:        5,
            decay_coefficient:      2.5,
            shuffle_seed:           10,
            learning_rate:          0.0005,
            lr_decay:               false,
            max_learning_rate:      0.005,
            min_learning_rate:      0.0001,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.batch_size == 0 {
            problems.push("batch_size must be positive".to_string());
        }
        if self.num_epochs == 0 {
            problems.push("num_epochs must be positive".to_string());
        }
        if self.evaluate_every == 0 || self.checkpoint_every == 0 {
            problems.push("evaluate_every and checkpoint_every must be positive".to_string());
        }
        if self.num_checkpoints == 0 {
            problems.push("num_checkpoints must be positive".to_string());
        }
        if !(self.dropout_keep_prob > 0.0 && self.dropout_keep_prob <= 1.0) {
            problems.push(format!("dropout_keep_prob must be in (0, 1], got {}", self.dropout_keep_prob));
        }
        if self.l2_reg_lambda < 0.0 {
            problems.push(format!("l2_reg_lambda must be >= 0, got {}", self.l2_reg_lambda));
        }
        if !(self.dev_sample_percentage > 0.0 && self.dev_sample_percentage < 1.0) {
            problems.push(format!(
                "dev_sample_percentage must be in (0, 1), got {}",
                self.dev_sample_percentage
            ));
        }
        if self.filter_sizes.is_empty() || self.filter_sizes.contains(&0) {
            problems.push("filter_sizes must be a non-empty list of positive sizes".to_string());
        }
        if self.num_filters == 0 || self.embedding_dim == 0 {
            problems.push("num_filters and embedding_dim must be positive".to_string());
        }
        if self.lr_decay && self.min_learning_rate > self.max_learning_rate {
            problems.push("min_learning_rate must not exceed max_learning_rate".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InvalidConfig(problems.join("; ")).into())
        }
    }

    pub fn lr_policy(&self) -> LearningRatePolicy {
        if self.lr_decay {
            LearningRatePolicy::ExponentialDecay {
                max_rate: self.max_learning_rate,
                min_rate: self.min_learning_rate,
            }
        } else {
            LearningRatePolicy::Constant { rate: self.learning_rate }
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            dropout_keep_prob: self.dropout_keep_prob,
            evaluate_every:    self.evaluate_every,
            checkpoint_every:  self.checkpoint_every,
        }
    }
}

// ─── Stage outputs ────────────────────────────────────────────────────────────
/// Vocabulary plus the shuffled train/dev split of the encoded corpus.
pub struct PreparedData {
    pub vocabulary:  Vocabulary,
    pub split:       Split,
    pub num_classes: usize,
}

/// What a finished (or interrupted) run leaves behind.
#[derive(Debug)]
pub struct TrainOutcome {
    pub run_dir: PathBuf,
    pub state:   TrainingState,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:   TrainConfig,
    shutdown: Option<Arc<AtomicBool>>,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config, shutdown: None }
    }

    /// Flag raised by the Ctrl-C handler. Checked after each loading
    /// stage, then between batches by the training loop.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: Reject bad flags before touching anything ───────────────
        cfg.validate()?;

        // ── Step 2: Resolve dataset / embedding selectors ────────────────────
        // Unknown names fail here, so no directory is created for them.
        let pipeline = PipelineFile::load(&cfg.config)?.resolve(cfg.enable_word_embeddings)?;
        let dataset_name   = pipeline.dataset.name();
        let embedding_name = pipeline.embedding.name();
        tracing::info!("Dataset: {}, word embedding: {}", dataset_name, embedding_name);

        // ── Step 3: Run directory, probed for writability ───────────────────
        let mut store = CheckpointStore::open(
            &cfg.runs_dir,
            &dataset_name.to_string(),
            &embedding_name.to_string(),
            cfg.num_checkpoints,
        )?;

        // ── Steps 4-6: Corpus → vocabulary → split ──────────────────────────
        let data = prepare_data(&pipeline.dataset, cfg)?;
        self.check_shutdown("preparing the corpus")?;

        // ── Step 7: Pretrained vectors (fatal if configured but unreadable) ──
        let embedding = pipeline.embedding.load(&data.vocabulary)?;
        let embedding_size = pipeline.embedding.dimension().unwrap_or(cfg.embedding_dim);
        self.check_shutdown("loading word embeddings")?;

        // ── Step 8: Artifacts needed to reuse the model later ───────────────
        store.save_vocabulary(&data.vocabulary)?;
        store.save_config(cfg)?;

        // ── Step 9: Classifier + training loop ──────────────────────────────
        let model_cfg = TextCnnConfig::new(
            data.vocabulary.max_document_length(),
            data.num_classes,
            data.vocabulary.len(),
            embedding_size,
            cfg.filter_sizes.clone(),
            cfg.num_filters,
        )
        .with_l2_reg_lambda(cfg.l2_reg_lambda);

        let device = Default::default();
        let mut classifier = sgd_classifier::<TrainBackend>(&model_cfg, &device)?;

        let scheduler = BatchScheduler::new(cfg.batch_size, cfg.num_epochs)?;
        let speed     = decay_speed(cfg.decay_coefficient, data.split.train.len(), cfg.batch_size);
        let schedule  = cfg.lr_policy().build(speed);
        tracing::info!(
            "{} steps planned ({} per epoch)",
            scheduler.total_batches(data.split.train.len()),
            scheduler.batches_per_epoch(data.split.train.len())
        );

        let mut training = TrainingLoop::new(cfg.loop_settings(), schedule)?;
        if let Some(flag) = &self.shutdown {
            training = training.with_stop_signal(flag.clone());
        }
        let mut summaries = SummarySink::open(&store.summary_dir("train"), &store.summary_dir("dev"));

        let state = training.initialize(&mut classifier, embedding.as_ref())?;
        let state = training.run(
            &mut classifier,
            state,
            scheduler.iterate(&data.split.train),
            &data.split.eval,
            &mut store,
            &mut summaries,
        )?;

        Ok(TrainOutcome { run_dir: store.run_dir().to_path_buf(), state })
    }

    /// Nothing has been trained yet, so an interrupt here aborts the run.
    fn check_shutdown(&self, stage: &str) -> Result<()> {
        match &self.shutdown {
            Some(flag) if flag.load(Ordering::SeqCst) => {
                tracing::warn!("Interrupted while {}, no training was done", stage);
                Err(PipelineError::Interrupted(stage.to_string()).into())
            }
            _ => Ok(()),
        }
    }
}

/// Load and clean the corpus, fit the vocabulary once, then
/// shuffle with the fixed seed and split off the dev tail.
pub fn prepare_data(source: &DatasetSource, cfg: &TrainConfig) -> Result<PreparedData> {
    let preprocessor = Preprocessor::new();
    let corpus = source.load()?.map_texts(|t| preprocessor.clean(t));
    if corpus.is_empty() {
        return Err(PipelineError::EmptyCorpus.into());
    }
    tracing::info!("Loaded {} examples in classes {:?}", corpus.len(), corpus.class_names());

    let vocabulary = Vocabulary::fit(corpus.texts())?;
    let encoded    = vocabulary.encode(&corpus)?;
    tracing::info!(
        "Vocabulary size: {}, max document length: {}",
        vocabulary.len(),
        vocabulary.max_document_length()
    );

    let shuffled = splitter::shuffle(&encoded, cfg.shuffle_seed);
    let split    = splitter::split(shuffled, cfg.dev_sample_percentage)?;
    tracing::info!("Train/Dev split: {}/{}", split.train.len(), split.eval.len());

    Ok(PreparedData { vocabulary, split, num_classes: corpus.num_classes() })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    /// 10 positive + 10 negative three-word sentences.
    fn write_polarity(dir: &Path) -> (PathBuf, PathBuf) {
        let pos: Vec<String> = (0..10).map(|i| format!("good film {i}")).collect();
        let neg: Vec<String> = (0..10).map(|i| format!("bad movie {i}")).collect();
        let pos_path = dir.join("rt-polarity.pos");
        let neg_path = dir.join("rt-polarity.neg");
        fs::write(&pos_path, pos.join("\n")).unwrap();
        fs::write(&neg_path, neg.join("\n")).unwrap();
        (pos_path, neg_path)
    }

    fn write_config(dir: &Path, dataset: &str, embeddings: &str) -> PathBuf {
        let (pos, neg) = write_polarity(dir);
        let yaml = format!(
            "word_embeddings:\n{embeddings}\ndatasets:\n  default: {dataset}\n  mrpolarity:\n    positive_data_file:\n      path: {}\n    negative_data_file:\n      path: {}\n",
            pos.display(),
            neg.display()
        );
        let path = dir.join("config.yml");
        fs::write(&path, yaml).unwrap();
        path
    }

    fn small_config(dir: &Path, config: PathBuf) -> TrainConfig {
        TrainConfig {
            config,
            runs_dir:         dir.join("runs"),
            embedding_dim:    4,
            filter_sizes:     vec![1, 2],
            num_filters:      2,
            batch_size:       4,
            num_epochs:       2,
            evaluate_every:   3,
            checkpoint_every: 5,
            num_checkpoints:  2,
            learning_rate:    0.01,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let cfg = TrainConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.lr_policy(), LearningRatePolicy::Constant { rate: 0.0005 });
    }

    #[test]
    fn test_validate_collects_problems() {
        let cfg = TrainConfig {
            batch_size:            0,
            dev_sample_percentage: 1.0,
            filter_sizes:          vec![],
            ..TrainConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("batch_size"));
        assert!(msg.contains("dev_sample_percentage"));
        assert!(msg.contains("filter_sizes"));
    }

    #[test]
    fn test_twenty_sentences_split_18_2_and_batch_4_4_4_4_2() {
        let dir = tempfile::tempdir().unwrap();
        let (positive, negative) = write_polarity(dir.path());
        let source = DatasetSource::MrPolarity { positive, negative };

        let data = prepare_data(&source, &TrainConfig::default()).unwrap();
        assert_eq!(data.split.train.len(), 18);
        assert_eq!(data.split.eval.len(), 2);
        assert_eq!(data.num_classes, 2);
        assert_eq!(data.vocabulary.max_document_length(), 3);

        let sizes: Vec<usize> = BatchScheduler::new(4, 1)
            .unwrap()
            .iterate(&data.split.train)
            .map(|b| b.data.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 4, 4, 2]);
    }

    #[test]
    fn test_unknown_dataset_creates_nothing() {
        let dir    = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "foo", "  default: ~");
        let cfg    = small_config(dir.path(), config);

        let err = TrainUseCase::new(cfg.clone()).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnknownDataset(name)) if name == "foo"
        ));
        assert!(!cfg.runs_dir.exists());
    }

    #[test]
    fn test_missing_word2vec_file_stops_before_training() {
        let dir    = tempfile::tempdir().unwrap();
        let vecs   = dir.path().join("missing.bin");
        let embeds = format!("  default: word2vec\n  word2vec:\n    path: {}\n    dimension: 4\n", vecs.display());
        let config = write_config(dir.path(), "mrpolarity", &embeds);
        let cfg    = small_config(dir.path(), config);

        let err = TrainUseCase::new(cfg.clone()).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmbeddingMissing(p)) if *p == vecs
        ));

        let checkpoints = cfg.runs_dir.join("mrpolarity").join("word2vec").join("checkpoints");
        assert_eq!(fs::read_dir(checkpoints).unwrap().count(), 0);
    }

    #[test]
    fn test_interrupt_during_loading_stops_before_artifacts() {
        let dir    = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "mrpolarity", "  default: ~");
        let cfg    = small_config(dir.path(), config);

        // Ctrl-C already pressed while the corpus was loading
        let flag = Arc::new(AtomicBool::new(true));
        let err  = TrainUseCase::new(cfg.clone()).with_shutdown(flag).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Interrupted(stage)) if stage == "preparing the corpus"
        ));

        let run_dir = cfg.runs_dir.join("mrpolarity").join("none");
        assert!(!run_dir.join("vocab.json").exists());
        assert_eq!(fs::read_dir(run_dir.join("checkpoints")).unwrap().count(), 0);
    }

    #[test]
    fn test_unraised_flag_lets_the_run_finish() {
        let dir    = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "mrpolarity", "  default: ~");
        let cfg    = small_config(dir.path(), config);

        let flag    = Arc::new(AtomicBool::new(false));
        let outcome = TrainUseCase::new(cfg).with_shutdown(flag).execute().unwrap();
        assert!(!outcome.state.interrupted);
        assert_eq!(outcome.state.step, 10);
    }

    #[test]
    fn test_end_to_end_run_without_embedding() {
        let dir    = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "mrpolarity", "  default: ~");
        let cfg    = small_config(dir.path(), config);

        let outcome = TrainUseCase::new(cfg.clone()).execute().unwrap();
        let run_dir = cfg.runs_dir.join("mrpolarity").join("none");
        assert_eq!(outcome.run_dir, run_dir);

        // 18 train rows, batch 4 → 5 steps per epoch, 2 epochs
        assert_eq!(outcome.state.step, 10);
        assert_eq!(outcome.state.checkpoints, vec![5, 10]);
        assert!(outcome.state.last_eval.is_some());
        assert!(run_dir.join("vocab.json").is_file());
        assert!(run_dir.join("train_config.json").is_file());
        assert!(run_dir.join("checkpoints").join("checkpoint.json").is_file());

        let saved: TrainConfig =
            serde_json::from_str(&fs::read_to_string(run_dir.join("train_config.json")).unwrap()).unwrap();
        assert_eq!(saved, cfg);
    }

    #[test]
    fn test_end_to_end_run_with_glove() {
        let dir   = tempfile::tempdir().unwrap();
        let glove = dir.path().join("glove.txt");
        fs::write(&glove, "good 0.1 0.2 0.3 0.4\nbad -0.1 -0.2 -0.3 -0.4\n").unwrap();
        let embeds = format!("  default: glove\n  glove:\n    path: {}\n    dimension: 4\n", glove.display());
        let config = write_config(dir.path(), "mrpolarity", &embeds);
        let cfg    = TrainConfig { embedding_dim: 300, ..small_config(dir.path(), config) };

        // the GloVe width wins over embedding_dim
        let outcome = TrainUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(outcome.run_dir, cfg.runs_dir.join("mrpolarity").join("glove"));
        assert_eq!(outcome.state.step, 10);
    }
}
