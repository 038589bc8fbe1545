// ============================================================
// Layer 5 — NCET Model
// ============================================================
// Composition of the typed components, wired once per batch:
//
//   embeddings, verb_mask ──► TokenEncoder ──► token_rep [B,T,2H]
//                                                 │
//          entity_mask, verb_mask ──► sentence_representations [B,S,4H]
//                                                 │
//                                           StateTracker
//                                          ╱            ╲
//                            decoder states              emissions [B,S,6]
//                                  │                          │
//              LocationHead ◄── token_rep, loc_mask          Crf
//                   │                                         │
//           loc logits [B,S,C]                       NLL / Viterbi
//
// TrainStep is the one interface the training loop and the
// evaluator talk to: a forward pass that returns the combined
// loss together with the counts used for accuracy.
//
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.

use anyhow::{ensure, Result};
use burn::prelude::*;

use crate::data::batcher::ProparaBatch;
use crate::domain::state::{StateTag, NUM_STATES};
use crate::infra::metrics::BatchStats;
use crate::ml::{
    aggregator::sentence_representations,
    crf::{Crf, CrfConfig},
    decoder::{StateTracker, StateTrackerConfig},
    encoder::{TokenEncoder, TokenEncoderConfig},
    host,
    location::{location_argmax, location_loss, LocationHead, LocationHeadConfig},
};

#[derive(Config, Debug)]
pub struct NcetConfig {
    /// Width of the external token vectors
    pub input_dim:   usize,
    pub embed_size:  usize,
    pub hidden_size: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
    #[config(default = 0.5)]
    pub embed_dropout: f64,
    #[config(default = false)]
    pub clip_verb_indicator: bool,
}

impl NcetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> NcetModel<B> {
        let encoder = TokenEncoderConfig::new(self.input_dim, self.embed_size, self.hidden_size)
            .with_dropout(self.dropout)
            .with_embed_dropout(self.embed_dropout)
            .with_clip_verb_indicator(self.clip_verb_indicator)
            .init(device);
        let tracker = StateTrackerConfig::new(self.hidden_size)
            .with_dropout(self.dropout)
            .init(device);
        NcetModel {
            encoder,
            tracker,
            crf:         CrfConfig::new(NUM_STATES).init(device),
            location:    LocationHeadConfig::new(self.hidden_size).init(device),
            hidden_size: self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct NcetModel<B: Backend> {
    pub encoder:     TokenEncoder<B>,
    pub tracker:     StateTracker<B>,
    pub crf:         Crf<B>,
    pub location:    LocationHead<B>,
    pub hidden_size: usize,
}

pub struct NcetOutput<B: Backend> {
    /// CRF emission scores [B, S, NUM_STATES]
    pub tag_logits: Tensor<B, 3>,
    /// Candidate scores for the location after each sentence [B, S, C]
    pub loc_logits: Tensor<B, 3>,
}

/// Loss of one batch plus the counts behind its accuracies.
pub struct StepOutput<B: Backend> {
    pub loss:  Tensor<B, 1>,
    pub stats: BatchStats,
}

/// Decoded, length-trimmed output for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstance {
    pub tags:      Vec<StateTag>,
    /// Raw candidate index after each sentence
    pub locations: Vec<usize>,
}

pub trait TrainStep<B: Backend> {
    /// Forward pass on a labelled batch:
    /// `state_loss + loc_loss_weight * loc_loss` and batch statistics.
    fn step(&self, batch: &ProparaBatch<B>, loc_loss_weight: f64) -> Result<StepOutput<B>>;
}

impl<B: Backend> NcetModel<B> {
    pub fn forward(&self, batch: &ProparaBatch<B>) -> NcetOutput<B> {
        let [b, t, _] = batch.embeddings.dims();
        let [_, s, _] = batch.entity_mask.dims();
        let [_, c] = batch.cand_mask.dims();

        let token_rep = self.encoder.forward(batch.embeddings.clone(), batch.verb_mask.clone());
        assert_eq!(token_rep.dims(), [b, t, 2 * self.hidden_size]);

        let sentences = sentence_representations(
            token_rep.clone(),
            batch.entity_mask.clone(),
            batch.verb_mask.clone(),
        );
        assert_eq!(sentences.dims(), [b, s, 4 * self.hidden_size]);

        let (hidden, tag_logits) = self.tracker.forward(sentences);
        let loc_logits = self.location.forward(
            hidden,
            token_rep,
            batch.loc_mask.clone(),
            batch.cand_mask.clone(),
        );
        assert_eq!(loc_logits.dims(), [b, s, c]);

        NcetOutput { tag_logits, loc_logits }
    }

    /// Best tag path and raw location per sentence, cut to each
    /// instance's sentence count.
    pub fn decode(&self, batch: &ProparaBatch<B>) -> Result<Vec<DecodedInstance>> {
        let out = self.forward(batch);
        let [_, sents, _] = out.loc_logits.dims();

        let paths = self.crf.decode(out.tag_logits, batch.sent_mask.clone())?;
        let locations = host::ints(location_argmax(out.loc_logits))?;

        paths
            .into_iter()
            .zip(&batch.metadata)
            .enumerate()
            .map(|(i, (path, meta))| {
                ensure!(
                    path.len() == meta.total_sents,
                    "decoded {} tags for {} sentences of {}",
                    path.len(),
                    meta.total_sents,
                    meta.entity
                );
                let tags = path
                    .into_iter()
                    .map(StateTag::from_index)
                    .collect::<Result<Vec<_>>>()?;
                let row = &locations[i * sents..i * sents + meta.total_sents];
                Ok(DecodedInstance {
                    tags,
                    locations: row.iter().map(|&c| c as usize).collect(),
                })
            })
            .collect()
    }
}

impl<B: Backend> TrainStep<B> for NcetModel<B> {
    fn step(&self, batch: &ProparaBatch<B>, loc_loss_weight: f64) -> Result<StepOutput<B>> {
        let out = self.forward(batch);

        let state_loss = self.crf.negative_log_likelihood(
            out.tag_logits.clone(),
            batch.gold_states.clone(),
            batch.sent_mask.clone(),
        );
        let loc_loss = location_loss(out.loc_logits.clone(), batch.gold_locs.clone());

        let paths = self.crf.decode(out.tag_logits, batch.sent_mask.clone())?;
        let pred_locs = host::ints(location_argmax(out.loc_logits))?;
        let gold_states = host::ints(batch.gold_states.clone())?;
        let gold_locs = host::ints(batch.gold_locs.clone())?;
        let [_, sents] = batch.gold_states.dims();

        let mut stats = count_correct(&paths, &gold_states, &pred_locs, &gold_locs, sents);
        stats.state_loss = host::scalar(state_loss.clone());
        stats.loc_loss = host::scalar(loc_loss.clone());

        let loss = state_loss + loc_loss.mul_scalar(loc_loss_weight);
        Ok(StepOutput { loss, stats })
    }
}

/// Accuracy counts over non-padded gold positions (gold >= 0).
///
/// `paths[b]` is the decoded tag path of row `b`; every other slice is
/// row-major `[batch, sents]`.
pub fn count_correct(
    paths:       &[Vec<usize>],
    gold_states: &[i64],
    pred_locs:   &[i64],
    gold_locs:   &[i64],
    sents:       usize,
) -> BatchStats {
    let mut stats = BatchStats::default();

    for (b, path) in paths.iter().enumerate() {
        for (s, &tag) in path.iter().enumerate() {
            let gold = gold_states[b * sents + s];
            if gold < 0 {
                continue;
            }
            stats.state_pred += 1;
            if gold == tag as i64 {
                stats.state_correct += 1;
            }
        }
    }

    for (pred, &gold) in pred_locs.iter().zip(gold_locs) {
        if gold < 0 {
            continue;
        }
        stats.loc_pred += 1;
        if *pred == gold {
            stats.loc_correct += 1;
        }
    }

    stats
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::collate, embedder::HashEmbedder, fixtures};
    use burn::{
        backend::{Autodiff, NdArray},
        module::AutodiffModule,
        optim::{AdamConfig, GradientsParams, Optimizer},
    };

    fn tiny_config() -> NcetConfig {
        NcetConfig::new(8, 6, 4).with_dropout(0.0).with_embed_dropout(0.0)
    }

    fn batch<B: Backend>(device: &B::Device) -> ProparaBatch<B> {
        collate(&[fixtures::ironore(), fixtures::short_seed()], &HashEmbedder::new(8, 1))
            .to_batch(device)
    }

    #[test]
    fn test_count_correct_skips_padding() {
        // two rows of up to two sentences; row 1 has a single sentence
        let paths = vec![vec![4, 3], vec![2]];
        let gold_states = [4, 2, 2, -1];
        let pred_locs = [1, 0, 0, 1];
        let gold_locs = [1, -1, 1, -1];
        let stats = count_correct(&paths, &gold_states, &pred_locs, &gold_locs, 2);
        assert_eq!((stats.state_correct, stats.state_pred), (2, 3));
        assert_eq!((stats.loc_correct, stats.loc_pred), (1, 2));
    }

    #[test]
    fn test_step_reports_finite_loss_and_counts() {
        let device = Default::default();
        let model = tiny_config().init::<NdArray>(&device);
        let out = model.step(&batch(&device), 1.0).unwrap();

        let loss = host::scalar(out.loss);
        assert!(loss.is_finite() && loss > 0.0);
        // 2 + 1 real sentences, every gold location supervised
        assert_eq!(out.stats.state_pred, 3);
        assert_eq!(out.stats.loc_pred, 3);
    }

    #[test]
    fn test_decode_trims_to_sentence_counts() {
        let device = Default::default();
        let model = tiny_config().init::<NdArray>(&device);
        let decoded = model.decode(&batch(&device)).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].tags.len(), 2);
        assert_eq!(decoded[1].tags.len(), 1);
        // both instances have two candidates ("?" included)
        assert!(decoded.iter().flat_map(|d| &d.locations).all(|&c| c < 2));
    }

    #[test]
    fn test_adam_steps_reduce_loss() {
        type AB = Autodiff<NdArray>;
        let device = Default::default();
        AB::seed(1234);
        let mut model = tiny_config().init::<AB>(&device);
        let mut optim = AdamConfig::new().init::<AB, NcetModel<AB>>();
        let train_batch = batch::<AB>(&device);

        let first = host::scalar(model.step(&train_batch, 1.0).unwrap().loss);
        for _ in 0..30 {
            let out = model.step(&train_batch, 1.0).unwrap();
            let grads = GradientsParams::from_grads(out.loss.backward(), &model);
            model = optim.step(1e-2, model, grads);
        }
        let last = host::scalar(model.step(&train_batch, 1.0).unwrap().loss);
        assert!(last < first, "loss did not decrease: {first} → {last}");

        // inference copy decodes on the inner backend
        let valid = model.valid();
        let decoded = valid.decode(&batch::<NdArray>(&device)).unwrap();
        assert_eq!(decoded[0].tags.len(), 2);
    }
}
