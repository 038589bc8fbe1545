// ============================================================
// Layer 5 — Predictor
// ============================================================
// Loads a checkpoint and runs the model without autodiff:
//
//   evaluate() — losses and accuracies on a labelled dataset
//   predict()  — decoded tags + raw locations per instance,
//                passed through the consistency post-processor
//
// Batches are not shuffled so the output order follows the
// dataset file.

use anyhow::Result;
use burn::{data::dataloader::DataLoaderBuilder, prelude::*};
use std::{path::Path, sync::Arc};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::ProparaBatcher, dataset::ProparaDataset};
use crate::domain::{
    consistency::{build_prediction, InstancePrediction, MovePolicy},
    traits::TokenEmbedder,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::RunningStats};
use crate::ml::{model::NcetModel, trainer::evaluate};

pub struct Predictor<B: Backend> {
    model:      NcetModel<B>,
    embedder:   Arc<dyn TokenEmbedder>,
    batch_size: usize,
    device:     B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(
        model:      NcetModel<B>,
        embedder:   Arc<dyn TokenEmbedder>,
        batch_size: usize,
        device:     B::Device,
    ) -> Self {
        Self { model, embedder, batch_size, device }
    }

    /// Rebuild the trained architecture from `cfg` and load its weights.
    pub fn from_checkpoint(
        ckpt:     &CheckpointManager,
        cfg:      &TrainConfig,
        restore:  Option<&Path>,
        embedder: Arc<dyn TokenEmbedder>,
        device:   B::Device,
    ) -> Result<Self> {
        let model = cfg.model_config().init::<B>(&device);
        let model = ckpt.load_model(model, restore, &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self::new(model, embedder, cfg.batch_size, device))
    }

    fn batcher(&self) -> ProparaBatcher<B> {
        ProparaBatcher::new(self.embedder.clone(), self.device.clone())
    }

    pub fn evaluate(&self, dataset: ProparaDataset, loc_loss_weight: f64) -> Result<RunningStats> {
        let loader = DataLoaderBuilder::new(self.batcher())
            .batch_size(self.batch_size)
            .num_workers(1)
            .build(dataset);
        evaluate(&self.model, loader.as_ref(), loc_loss_weight)
    }

    pub fn predict(&self, dataset: ProparaDataset, policy: MovePolicy) -> Result<Vec<InstancePrediction>> {
        let total = dataset.instance_count();
        let loader = DataLoaderBuilder::new(self.batcher())
            .batch_size(self.batch_size)
            .num_workers(1)
            .build(dataset);

        let mut predictions = Vec::with_capacity(total);
        for batch in loader.iter() {
            let decoded = self.model.decode(&batch)?;
            for (meta, d) in batch.metadata.iter().zip(decoded) {
                predictions.push(build_prediction(meta, &d.tags, &d.locations, policy));
            }
        }

        tracing::info!("Predicted {} instances", predictions.len());
        Ok(predictions)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{embedder::HashEmbedder, fixtures};
    use crate::ml::model::NcetConfig;
    use burn::backend::NdArray;

    #[test]
    fn test_predictions_are_consistent_and_ordered() {
        let device = Default::default();
        let model = NcetConfig::new(4, 4, 2).init::<NdArray>(&device);
        let predictor = Predictor::new(model, Arc::new(HashEmbedder::new(4, 0)), 1, device);

        let dataset = ProparaDataset::new(vec![fixtures::ironore(), fixtures::short_seed()]);
        let preds = predictor.predict(dataset, MovePolicy::Trust).unwrap();

        assert_eq!(preds.len(), 2);
        assert_eq!((preds[0].para_id, preds[0].sentences.len()), (12, 2));
        assert_eq!((preds[1].para_id, preds[1].sentences.len()), (3, 1));
        for p in &preds {
            // adjacent sentences share a boundary
            for w in p.sentences.windows(2) {
                assert_eq!(w[0].loc_after, w[1].loc_before);
            }
        }
    }
}
