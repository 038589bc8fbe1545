// ============================================================
// Layer 2 — Model Source
// ============================================================
// What evaluate and predict share: where the trained model lives
// and how to rebuild it.
//
//   train_config.json  → architecture, embedder settings
//   best checkpoint    → weights (or --restore <path>)
//   --embeddings       → vectors for the evaluated paragraphs;
//                        falls back to the training embeddings

use anyhow::{ensure, Result};
use burn::prelude::Backend;
use std::{path::PathBuf, sync::Arc};

use crate::application::train_use_case::{build_embedder, TrainConfig};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{backend::DeviceKind, inferencer::Predictor};

#[derive(Debug, Clone)]
pub struct ModelSource {
    pub checkpoint_dir: PathBuf,
    pub restore:        Option<PathBuf>,
    pub embeddings:     Option<PathBuf>,
    /// Overrides the training batch size
    pub batch_size:     Option<usize>,
    pub device:         DeviceKind,
}

impl ModelSource {
    pub fn load<B: Backend>(&self, device: B::Device) -> Result<(Predictor<B>, TrainConfig)> {
        let ckpt = CheckpointManager::open(&self.checkpoint_dir);
        tracing::info!("Loading model from '{}'", ckpt.dir().display());
        let mut cfg = ckpt.load_config()?;
        if let Some(batch_size) = self.batch_size {
            ensure!(batch_size >= 1, "--batch-size must be at least 1");
            cfg.batch_size = batch_size;
        }

        let embeddings = self.embeddings.as_deref().or(cfg.embeddings.as_deref());
        let embedder = build_embedder(embeddings, cfg.embed_dim, cfg.seed)?;
        ensure!(
            embedder.dim() == cfg.embed_dim,
            "Embeddings have width {} but the model was trained on width {}",
            embedder.dim(),
            cfg.embed_dim
        );

        let predictor = Predictor::from_checkpoint(
            &ckpt,
            &cfg,
            self.restore.as_deref(),
            Arc::clone(&embedder),
            device,
        )?;
        Ok((predictor, cfg))
    }
}
