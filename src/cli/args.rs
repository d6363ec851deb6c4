// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Flat flag set of the trainer; no subcommands. Defaults match
// TrainConfig::default().
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::Args;
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// YAML file selecting the dataset and word embedding
    #[arg(long, default_value = "config.yml")]
    pub config: PathBuf,

    /// Root of the per-(dataset, embedding) run directories
    #[arg(long, default_value = "runs")]
    pub runs_dir: PathBuf,

    /// Fraction of the shuffled data held out for evaluation
    #[arg(long, default_value_t = 0.1)]
    pub dev_sample_percentage: f64,

    /// Initialise the embedding layer from the configured vectors
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub enable_word_embeddings: bool,

    /// Embedding width when no pretrained vectors are used
    #[arg(long, default_value_t = 300)]
    pub embedding_dim: usize,

    /// Comma-separated convolution widths
    #[arg(long, value_delimiter = ',', default_value = "3,4,5")]
    pub filter_sizes: Vec<usize>,

    /// Filters per convolution width
    #[arg(long, default_value_t = 128)]
    pub num_filters: usize,

    /// Probability of keeping an activation during training
    #[arg(long, default_value_t = 1.0)]
    pub dropout_keep_prob: f64,

    /// L2 penalty on the output layer
    #[arg(long, default_value_t = 0.0)]
    pub l2_reg_lambda: f64,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 300)]
    pub num_epochs: usize,

    /// Evaluate on the dev set every this many steps
    #[arg(long, default_value_t = 200)]
    pub evaluate_every: usize,

    /// Save a checkpoint every this many steps
    #[arg(long, default_value_t = 200)]
    pub checkpoint_every: usize,

    /// Checkpoints kept on disk
    #[arg(long, default_value_t = 5)]
    pub num_checkpoints: usize,

    /// Epochs per e-fold learning-rate decay
    #[arg(long, default_value_t = 2.5)]
    pub decay_coefficient: f64,

    /// Seed of the train/dev shuffle
    #[arg(long, default_value_t = 10)]
    pub shuffle_seed: u64,

    /// Constant learning rate (ignored with --lr-decay)
    #[arg(long, default_value_t = 0.0005)]
    pub learning_rate: f64,

    /// Decay exponentially from --max-learning-rate to --min-learning-rate
    #[arg(long)]
    pub lr_decay: bool,

    #[arg(long, default_value_t = 0.005)]
    pub max_learning_rate: f64,

    #[arg(long, default_value_t = 0.0001)]
    pub min_learning_rate: f64,
}

/// Boundary between Layer 1 and Layer 2: the application layer
/// never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            config:                 a.config,
            runs_dir:               a.runs_dir,
            dev_sample_percentage:  a.dev_sample_percentage,
            enable_word_embeddings: a.enable_word_embeddings,
            embedding_dim:          a.embedding_dim,
            filter_sizes:           a.filter_sizes,
            num_filters:            a.num_filters,
            dropout_keep_prob:      a.dropout_keep_prob,
            l2_reg_lambda:          a.l2_reg_lambda,
            batch_size:             a.batch_size,
            num_epochs:             a.num_epochs,
            evaluate_every:         a.evaluate_every,
            checkpoint_every:       a.checkpoint_every,
            num_checkpoints:        a.num_checkpoints,
            decay_coefficient:      a.decay_coefficient,
            shuffle_seed:           a.shuffle_seed,
            learning_rate:          a.learning_rate,
            lr_decay:               a.lr_decay,
            max_learning_rate:      a.max_learning_rate,
            min_learning_rate:      a.min_learning_rate,
        }
    }
}
