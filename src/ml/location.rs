// ============================================================
// Layer 5 — Location Selection Head
// ============================================================
// Picks, for every sentence, the candidate location the entity
// occupies *after* that sentence.
//
//   candidates  = masked_mean(token_rep, loc_mask)       [B,C,2H]
//   query       = Linear(decoder state)                  [B,S,2H]
//   logits      = query · candidatesᵀ                    [B,S,C]
//
// Padded candidates are filled with a large negative score so
// softmax never assigns them mass. The loss is an ordinary
// per-position cross entropy, averaged over supervised
// positions only (gold >= 0). This head is not structured; the
// consistency pass in the domain layer ties it to the tags.

use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::ml::aggregator::masked_mean;

const MASKED_SCORE: f32 = -1e9;

#[derive(Config, Debug)]
pub struct LocationHeadConfig {
    pub hidden_size: usize,
}

impl LocationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LocationHead<B> {
        let d = 2 * self.hidden_size;
        LocationHead {
            query: LinearConfig::new(d, d)
                .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct LocationHead<B: Backend> {
    pub query: Linear<B>,
}

impl<B: Backend> LocationHead<B> {
    /// decoder: [B, S, 2H], token_rep: [B, T, 2H], loc_mask: [B, C, T],
    /// cand_mask: [B, C] → logits [B, S, C]
    pub fn forward(
        &self,
        decoder:   Tensor<B, 3>,
        token_rep: Tensor<B, 3>,
        loc_mask:  Tensor<B, 3>,
        cand_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch, sents, _] = decoder.dims();
        let [_, cands] = cand_mask.dims();

        let candidates = masked_mean(token_rep, loc_mask);     // [B, C, 2H]
        let query = self.query.forward(decoder);               // [B, S, 2H]
        let logits = query.matmul(candidates.swap_dims(1, 2)); // [B, S, C]

        let padded = cand_mask
            .equal_elem(0)
            .unsqueeze_dim::<3>(1)
            .expand([batch, sents, cands]);
        logits.mask_fill(padded, MASKED_SCORE)
    }
}

/// Mean cross entropy over positions with gold >= 0 → scalar [1]
pub fn location_loss<B: Backend>(logits: Tensor<B, 3>, gold: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [batch, sents, _] = logits.dims();
    assert_eq!(gold.dims(), [batch, sents], "gold locations do not match logits");

    let picked = log_softmax(logits, 2)
        .gather(2, gold.clone().clamp_min(0).unsqueeze_dim(2))
        .reshape([batch, sents]);
    let weight = gold.greater_equal_elem(0).float();
    let count = weight.clone().sum().clamp_min(1.0);

    (picked * weight).sum().neg() / count
}

/// Highest-scoring candidate per sentence → [B, S]
pub fn location_argmax<B: Backend>(logits: Tensor<B, 3>) -> Tensor<B, 2, Int> {
    let [batch, sents, _] = logits.dims();
    logits.argmax(2).reshape([batch, sents])
}
