// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `evaluate` and
// `predict`, and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enums)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{model_source::ModelSource, train_use_case::TrainConfig};
use crate::domain::consistency::MovePolicy;
use crate::infra::checkpoint::SaveMode;
use crate::ml::{backend::DeviceKind, encoder::VerbIndicator};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the state tracker on a labelled dataset
    Train(TrainArgs),

    /// Report losses and accuracies of a trained model on a labelled dataset
    Evaluate(EvaluateArgs),

    /// Fill the prediction template for a dataset using a trained model
    Predict(PredictArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training instances (JSON array)
    #[arg(long, default_value = "data/train.json")]
    pub train_set: PathBuf,

    /// Dev instances, evaluated `--report` times per epoch
    #[arg(long, default_value = "data/dev.json")]
    pub dev_set: PathBuf,

    /// Where checkpoints, train_config.json and metrics.csv go
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Keep only the best checkpoint, or one per evaluation round
    #[arg(long, value_enum, default_value_t = SaveMode::Best)]
    pub save_mode: SaveMode,

    /// Train without writing model checkpoints
    #[arg(long)]
    pub no_save_ckpt: bool,

    /// Checkpoint to initialise the weights from
    #[arg(long)]
    pub restore: Option<PathBuf>,

    /// Number of epochs; -1 trains until early stopping
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    pub epochs: i64,

    /// Evaluation rounds without improvement before stopping; -1 disables
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    pub impatience: i64,

    /// Evaluation rounds per epoch
    #[arg(long, default_value_t = 2)]
    pub report: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Precomputed token vectors; hashed vectors are used when absent
    #[arg(long)]
    pub embeddings: Option<PathBuf>,

    /// Width of the hashed token vectors (ignored with --embeddings)
    #[arg(long, default_value_t = 1024)]
    pub embed_dim: usize,

    /// Token encoder input width, including the verb indicator
    #[arg(long, default_value_t = 128)]
    pub embed_size: usize,

    /// LSTM hidden size per direction
    #[arg(long, default_value_t = 128)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 3e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Dropout on the projected token embeddings
    #[arg(long, default_value_t = 0.5)]
    pub embed_dropout: f64,

    /// Weight of the location loss
    #[arg(long, default_value_t = 1.0)]
    pub loc_loss: f64,

    /// How overlapping verb spans combine into the indicator feature
    #[arg(long, value_enum, default_value_t = VerbIndicator::Sum)]
    pub verb_indicator: VerbIndicator,

    #[arg(long, default_value_t = 1234)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = DeviceKind::Cpu)]
    pub device: DeviceKind,
}

/// Negative counts mean "no limit".
fn limit(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_set:      a.train_set,
            dev_set:        a.dev_set,
            checkpoint_dir: a.checkpoint_dir,
            save_mode:      a.save_mode,
            no_save_ckpt:   a.no_save_ckpt,
            restore:        a.restore,
            epochs:         limit(a.epochs),
            impatience:     limit(a.impatience),
            report:         a.report,
            batch_size:     a.batch_size,
            embeddings:     a.embeddings,
            embed_dim:      a.embed_dim,
            embed_size:     a.embed_size,
            hidden_size:    a.hidden_size,
            lr:             a.lr,
            dropout:        a.dropout,
            embed_dropout:  a.embed_dropout,
            loc_loss:       a.loc_loss,
            verb_indicator: a.verb_indicator,
            seed:           a.seed,
            device:         a.device,
        }
    }
}

/// Flags locating a trained model, shared by `evaluate` and `predict`
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Specific checkpoint to load instead of the best one
    #[arg(long)]
    pub restore: Option<PathBuf>,

    /// Precomputed token vectors for this dataset; defaults to the
    /// file used for training
    #[arg(long)]
    pub embeddings: Option<PathBuf>,

    /// Overrides the training batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long, value_enum, default_value_t = DeviceKind::Cpu)]
    pub device: DeviceKind,
}

impl From<ModelArgs> for ModelSource {
    fn from(a: ModelArgs) -> Self {
        ModelSource {
            checkpoint_dir: a.checkpoint_dir,
            restore:        a.restore,
            embeddings:     a.embeddings,
            batch_size:     a.batch_size,
            device:         a.device,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Labelled instances to score
    #[arg(long, default_value = "data/dev.json")]
    pub data_set: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Instances to predict (gold labels not required)
    #[arg(long, default_value = "data/test.json")]
    pub test_set: PathBuf,

    /// Tab-separated template: para_id, sent_id, entity, NONE
    #[arg(long)]
    pub template: PathBuf,

    /// Where the filled template is written
    #[arg(long, default_value = "predictions.tsv")]
    pub output: PathBuf,

    /// MOVE steps whose predicted locations agree: keep them, or
    /// replace the destination with "?"
    #[arg(long, value_enum, default_value_t = MovePolicy::Trust)]
    pub move_policy: MovePolicy,

    #[command(flatten)]
    pub model: ModelArgs,
}
