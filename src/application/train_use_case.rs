// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Build the token embedder   (Layer 4 - data)
//   Step 2: Load train + dev sets      (Layer 4 - data)
//   Step 3: Checkpoint manager, config (Layer 6 - infra)
//   Step 4: Metrics CSV                (Layer 6 - infra)
//   Step 5: Build / restore the model  (Layer 5 - ml)
//   Step 6: Run training loop          (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use burn::{module::Module, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::data::{
    dataset::ProparaDataset,
    embedder::{HashEmbedder, PrecomputedEmbedder},
    loader::JsonInstanceLoader,
};
use crate::domain::traits::{InstanceSource, TokenEmbedder};
use crate::infra::{
    checkpoint::{CheckpointManager, SaveMode},
    metrics::MetricsLogger,
};
use crate::ml::{
    backend::{dispatch, BackendTask, DeviceKind},
    encoder::VerbIndicator,
    model::NcetConfig,
    trainer::{run_training, TrainOutcome, TrainingContext},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoints as train_config.json so evaluate and
// predict rebuild exactly the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_set:      PathBuf,
    pub dev_set:        PathBuf,
    pub checkpoint_dir: PathBuf,
    pub save_mode:      SaveMode,
    pub no_save_ckpt:   bool,
    /// Weights to start from instead of a fresh initialisation
    pub restore:        Option<PathBuf>,
    /// None = train until early stopping
    pub epochs:         Option<usize>,
    /// Evaluation rounds without improvement before stopping; None disables
    pub impatience:     Option<usize>,
    /// Evaluation rounds per epoch
    pub report:         usize,
    pub batch_size:     usize,
    /// Precomputed token vectors; None uses the hash embedder
    pub embeddings:     Option<PathBuf>,
    /// Width of the external token vectors
    pub embed_dim:      usize,
    pub embed_size:     usize,
    pub hidden_size:    usize,
    pub lr:             f64,
    pub dropout:        f64,
    pub embed_dropout:  f64,
    /// Weight of the location loss in the combined objective
    pub loc_loss:       f64,
    pub verb_indicator: VerbIndicator,
    pub seed:           u64,
    pub device:         DeviceKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_set:      PathBuf::from("data/train.json"),
            dev_set:        PathBuf::from("data/dev.json"),
            checkpoint_dir: PathBuf::from("checkpoints"),
            save_mode:      SaveMode::Best,
            no_save_ckpt:   false,
            restore:        None,
            epochs:         Some(100),
            impatience:     Some(20),
            report:         2,
            batch_size:     64,
            embeddings:     None,
            embed_dim:      1024,
            embed_size:     128,
            hidden_size:    128,
            lr:             3e-4,
            dropout:        0.1,
            embed_dropout:  0.5,
            loc_loss:       1.0,
            verb_indicator: VerbIndicator::Sum,
            seed:           1234,
            device:         DeviceKind::Cpu,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> NcetConfig {
        NcetConfig::new(self.embed_dim, self.embed_size, self.hidden_size)
            .with_dropout(self.dropout)
            .with_embed_dropout(self.embed_dropout)
            .with_clip_verb_indicator(self.verb_indicator == VerbIndicator::Clip)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.report >= 1, "--report must be at least 1");
        ensure!(self.batch_size >= 1, "--batch-size must be at least 1");
        ensure!(self.embed_size >= 2, "--embed-size must leave room for the verb indicator");
        ensure!(self.hidden_size >= 1, "--hidden-size must be positive");
        ensure!(self.embed_dim >= 1, "--embed-dim must be positive");
        Ok(())
    }
}

/// Token embedder for `path` (precomputed vectors) or the hash fallback.
pub fn build_embedder(
    path:      Option<&Path>,
    embed_dim: usize,
    seed:      u64,
) -> Result<Arc<dyn TokenEmbedder>> {
    Ok(match path {
        Some(path) => Arc::new(PrecomputedEmbedder::from_file(path)?),
        None => {
            tracing::info!("No embeddings file given, using hashed token vectors (dim={embed_dim})");
            Arc::new(HashEmbedder::new(embed_dim, seed))
        }
    })
}

pub fn load_dataset(path: &Path) -> Result<ProparaDataset> {
    Ok(ProparaDataset::new(JsonInstanceLoader::new(path).load_all()?))
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(self) -> Result<TrainOutcome> {
        self.config.validate()?;
        let device = self.config.device;
        dispatch(device, self)
    }
}

impl BackendTask for TrainUseCase {
    type Output = TrainOutcome;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<TrainOutcome> {
        let mut cfg = self.config;
        B::seed(cfg.seed);

        // ── Step 1: Token embedder ────────────────────────────────────────────
        // The model input width follows whatever the embedder produces
        let embedder = build_embedder(cfg.embeddings.as_deref(), cfg.embed_dim, cfg.seed)?;
        cfg.embed_dim = embedder.dim();

        // ── Step 2: Datasets ──────────────────────────────────────────────────
        let train = load_dataset(&cfg.train_set)?;
        let dev   = load_dataset(&cfg.dev_set)?;
        ensure!(train.is_labelled(), "Training set '{}' lacks gold labels", cfg.train_set.display());
        ensure!(dev.is_labelled(), "Dev set '{}' lacks gold labels", cfg.dev_set.display());
        tracing::info!(
            "Datasets: {} train, {} dev instances",
            train.instance_count(),
            dev.instance_count()
        );

        // ── Step 3: Checkpoints + config for inference ───────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir, cfg.save_mode, !cfg.no_save_ckpt)?;
        ckpt.save_config(&cfg)?;

        // ── Step 4: Metrics CSV ──────────────────────────────────────────────
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;
        tracing::info!("Metrics will be appended to '{}'", metrics.csv_path().display());

        // ── Step 5: Model ────────────────────────────────────────────────────
        let mut model = cfg.model_config().init::<B>(&device);
        if let Some(restore) = &cfg.restore {
            model = ckpt.load_model(model, Some(restore.as_path()), &device)?;
        }
        tracing::info!(
            "Model ready: embed_size={}, hidden_size={}, {} parameters",
            cfg.embed_size,
            cfg.hidden_size,
            model.num_params()
        );

        // ── Step 6: Training loop (Layer 5) ──────────────────────────────────
        let ctx = TrainingContext { embedder, ckpt: &ckpt, metrics: &metrics };
        run_training(&cfg, model, train, dev, ctx, device)
    }
}
