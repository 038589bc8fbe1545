// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Orchestrates prediction:
//
//   Step 1: Rebuild the model from the checkpoint   (Layer 5 - ml)
//   Step 2: Load the test set                       (Layer 4 - data)
//   Step 3: Decode + consistency post-processing    (Layers 5, 3)
//   Step 4: Fill the output template                (Layer 6 - infra)

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::{model_source::ModelSource, train_use_case::load_dataset};
use crate::domain::consistency::MovePolicy;
use crate::infra::output_writer::{index_predictions, PredictionWriter};
use crate::ml::backend::{dispatch, BackendTask};

pub struct PredictUseCase {
    pub source:      ModelSource,
    pub test_set:    PathBuf,
    /// Tab-separated template with NONE placeholders
    pub template:    PathBuf,
    pub output:      PathBuf,
    pub move_policy: MovePolicy,
}

impl PredictUseCase {
    /// Returns the number of lines written.
    pub fn execute(self) -> Result<usize> {
        let device = self.source.device;
        dispatch(device, self)
    }
}

impl BackendTask for PredictUseCase {
    type Output = usize;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<usize> {
        // ── Step 1: Model ─────────────────────────────────────────────────────
        let (predictor, _) = self.source.load::<B::InnerBackend>(device)?;

        // ── Step 2: Test set (gold labels optional) ──────────────────────────
        let dataset = load_dataset(&self.test_set)?;

        // ── Step 3: Decode ───────────────────────────────────────────────────
        let predictions = predictor.predict(dataset, self.move_policy)?;

        // ── Step 4: Output file ──────────────────────────────────────────────
        PredictionWriter::write(&self.template, &self.output, &index_predictions(predictions))
    }
}
