// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Loads a trained model and reports losses and accuracies on a
// labelled dataset, the same numbers the training loop logs for
// the dev set.

use anyhow::{ensure, Result};
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::{model_source::ModelSource, train_use_case::load_dataset};
use crate::infra::metrics::RunningStats;
use crate::ml::backend::{dispatch, BackendTask};

pub struct EvaluateUseCase {
    source:  ModelSource,
    dataset: PathBuf,
}

impl EvaluateUseCase {
    pub fn new(source: ModelSource, dataset: PathBuf) -> Self {
        Self { source, dataset }
    }

    pub fn execute(self) -> Result<RunningStats> {
        let device = self.source.device;
        dispatch(device, self)
    }
}

impl BackendTask for EvaluateUseCase {
    type Output = RunningStats;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<RunningStats> {
        let (predictor, cfg) = self.source.load::<B::InnerBackend>(device)?;

        let dataset = load_dataset(&self.dataset)?;
        ensure!(
            dataset.is_labelled(),
            "'{}' has no gold labels; use 'predict' instead",
            self.dataset.display()
        );

        let stats = predictor.evaluate(dataset, cfg.loc_loss)?;
        ensure!(!stats.is_empty(), "'{}' contains no scored sentences", self.dataset.display());
        tracing::info!("Evaluation on '{}': {}", self.dataset.display(), stats.summary());
        Ok(stats)
    }
}
