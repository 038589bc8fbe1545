// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + periodic dev evaluation using Burn's DataLoader and Adam.
//
//   for each epoch (unbounded when epochs = None):
//     for each batch:
//       loss = state NLL + loc_loss_weight * location CE
//       backward, Adam step
//       at each report point of the epoch:
//         evaluate on dev with model.valid()
//         append metrics.csv row
//         new best → best_checkpoint_<score>, impatience = 0
//         else     → checkpoint_<score> (save mode "all"), impatience += 1
//         impatience reached → return EarlyStopped
//
// Key Burn insight:
//   - Training runs on B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - so the dev batcher is built for B::InnerBackend too
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{ProparaBatch, ProparaBatcher},
    dataset::ProparaDataset,
};
use crate::domain::traits::TokenEmbedder;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EvalRecord, MetricsLogger, RunningStats},
};
use crate::ml::{
    host,
    model::{NcetModel, TrainStep},
};

/// How a training run ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainOutcome {
    /// Ran every requested epoch
    Completed { best_score: f64 },
    /// Dev score did not improve for `impatience` consecutive rounds
    EarlyStopped { best_score: f64, epoch: usize },
}

impl TrainOutcome {
    pub fn best_score(&self) -> f64 {
        match self {
            TrainOutcome::Completed { best_score }
            | TrainOutcome::EarlyStopped { best_score, .. } => *best_score,
        }
    }
}

/// Batch counts (1-based, within an epoch) after which to evaluate.
///
/// Evenly spaced, last one always at the end of the epoch.
pub fn report_points(total_batches: usize, report_times: usize) -> Vec<usize> {
    let times = report_times.max(1);
    let mut points: Vec<usize> = (1..=times)
        .map(|i| (i * total_batches).div_ceil(times))
        .filter(|&p| p > 0)
        .collect();
    points.dedup();
    points
}

pub struct TrainingContext<'a> {
    pub embedder: Arc<dyn TokenEmbedder>,
    pub ckpt:     &'a CheckpointManager,
    pub metrics:  &'a MetricsLogger,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:       &TrainConfig,
    mut model: NcetModel<B>,
    train:     ProparaDataset,
    dev:       ProparaDataset,
    ctx:       TrainingContext<'_>,
    device:    B::Device,
) -> Result<TrainOutcome> {
    let total_batches = train.batch_count(cfg.batch_size);
    ensure!(total_batches > 0, "Training set is empty");
    let report_at = report_points(total_batches, cfg.report);
    tracing::info!(
        "{} training instances, {} batches per epoch, evaluating after batches {:?}",
        train.instance_count(),
        total_batches,
        report_at
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init::<B, NcetModel<B>>();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader = DataLoaderBuilder::new(ProparaBatcher::<B>::new(ctx.embedder.clone(), device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train);

    // ── Dev data loader (InnerBackend — no autodiff overhead) ─────────────────
    let dev_loader = DataLoaderBuilder::new(ProparaBatcher::<B::InnerBackend>::new(ctx.embedder, device))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(dev);

    let mut best_score = f64::NEG_INFINITY;
    let mut impatience = 0usize;
    let mut epoch = 0usize;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    while cfg.epochs.map_or(true, |max| epoch < max) {
        epoch += 1;
        let mut running = RunningStats::default();
        let mut round = 0usize;

        for (i, batch) in train_loader.iter().enumerate() {
            let out = model.step(&batch, cfg.loc_loss)?;
            let loss = host::scalar(out.loss.clone());
            ensure!(
                loss.is_finite(),
                "Loss became {loss} at epoch {epoch}, batch {}; stopping",
                i + 1
            );
            running.add(&out.stats);

            // Backward pass + Adam update
            let grads = GradientsParams::from_grads(out.loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);

            if !report_at.contains(&(i + 1)) {
                continue;
            }
            round += 1;

            // ── Evaluation round ──────────────────────────────────────────────
            // model.valid() drops autodiff and disables dropout
            let dev_stats = evaluate(&model.valid(), dev_loader.as_ref(), cfg.loc_loss)?;
            let record = EvalRecord::new(epoch, round, &running, &dev_stats);
            ctx.metrics.log(&record)?;

            tracing::info!("Epoch {epoch} round {round} | train: {}", running.summary());
            tracing::info!("Epoch {epoch} round {round} | dev:   {}", dev_stats.summary());

            if record.is_improvement(best_score) {
                best_score = record.dev_score;
                impatience = 0;
                tracing::info!("New best score: {best_score:.3}");
                ctx.ckpt.save_best(&model, best_score)?;
            } else {
                impatience += 1;
                tracing::info!("Impatience: {impatience}, best score: {best_score:.3}");
                ctx.ckpt.save_round(&model, record.dev_score)?;
                if cfg.impatience.is_some_and(|limit| impatience >= limit) {
                    tracing::info!("Early stopping at epoch {epoch}");
                    return Ok(TrainOutcome::EarlyStopped { best_score, epoch });
                }
            }

            running = RunningStats::default();
        }
    }

    tracing::info!("Training complete! Best dev score {best_score:.3}");
    Ok(TrainOutcome::Completed { best_score })
}

/// Losses and accuracies of `model` over every batch of `loader`.
pub fn evaluate<B: Backend, M: TrainStep<B>>(
    model:           &M,
    loader:          &dyn DataLoader<ProparaBatch<B>>,
    loc_loss_weight: f64,
) -> Result<RunningStats> {
    let mut stats = RunningStats::default();
    for batch in loader.iter() {
        stats.add(&model.step(&batch, loc_loss_weight)?.stats);
    }
    Ok(stats)
}
