// ============================================================
// Layer 5 — Token Encoder
// ============================================================
// external embeddings [B,T,D]
//     │  Linear(D → embed_size-1) + dropout (Xavier-normal init)
//     ▼
// ‖ verb indicator [B,T,1]     (verb mask summed over sentences)
//     │
//     ▼
// BiLSTM(embed_size → H)       → [B,T,2H]
//     │  dropout (active only on an autodiff backend)
//     ▼
// contextual token representations
//
// The verb indicator is a *sum*: a token marked as the predicate
// of several sentences gets a value above 1. Sum is the default;
// VerbIndicator::Clip bounds it at 1 instead.

use burn::{
    nn::{
        BiLstm, BiLstmConfig, Dropout, DropoutConfig, Initializer, Linear, LinearConfig,
    },
    prelude::*,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VerbIndicator {
    /// Sum of the verb mask across sentences (may exceed 1)
    #[default]
    Sum,
    /// Sum clipped to 1
    Clip,
}

#[derive(Config, Debug)]
pub struct TokenEncoderConfig {
    /// Width of the vectors coming from the embedding service
    pub input_dim:   usize,
    /// Recurrent input width, verb indicator included
    pub embed_size:  usize,
    pub hidden_size: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
    #[config(default = 0.5)]
    pub embed_dropout: f64,
    #[config(default = false)]
    pub clip_verb_indicator: bool,
}

impl TokenEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenEncoder<B> {
        assert!(self.embed_size >= 2, "embed_size must leave room for the verb indicator");
        let project = LinearConfig::new(self.input_dim, self.embed_size - 1)
            .with_initializer(Initializer::XavierNormal { gain: 1.0 })
            .init(device);
        TokenEncoder {
            project,
            project_dropout:     DropoutConfig::new(self.embed_dropout).init(),
            lstm:                BiLstmConfig::new(self.embed_size, self.hidden_size, true).init(device),
            dropout:             DropoutConfig::new(self.dropout).init(),
            clip_verb_indicator: self.clip_verb_indicator,
            hidden_size:         self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct TokenEncoder<B: Backend> {
    pub project:             Linear<B>,
    pub project_dropout:     Dropout,
    pub lstm:                BiLstm<B>,
    pub dropout:             Dropout,
    pub clip_verb_indicator: bool,
    pub hidden_size:         usize,
}

impl<B: Backend> TokenEncoder<B> {
    /// embeddings: [B, T, D], verb_mask: [B, S, T] → [B, T, 2H]
    pub fn forward(&self, embeddings: Tensor<B, 3>, verb_mask: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, tokens, _] = embeddings.dims();

        let projected = self.project_dropout.forward(self.project.forward(embeddings));
        let indicator = verb_indicator(verb_mask, self.clip_verb_indicator);
        assert_eq!(indicator.dims(), [batch, tokens, 1], "verb mask does not cover every token");

        let input = Tensor::cat(vec![projected, indicator], 2);
        let (output, _) = self.lstm.forward(input, None);
        let output = self.dropout.forward(output);

        assert_eq!(output.dims(), [batch, tokens, 2 * self.hidden_size]);
        output
    }
}

/// Per-token verb feature: verb_mask [B, S, T] summed over S → [B, T, 1]
pub fn verb_indicator<B: Backend>(verb_mask: Tensor<B, 3>, clip: bool) -> Tensor<B, 3> {
    let summed = verb_mask.sum_dim(1).swap_dims(1, 2);
    if clip { summed.clamp_max(1.0) } else { summed }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn shared_verb_mask(device: &<TB as Backend>::Device) -> Tensor<TB, 3> {
        // token 1 is the predicate of both sentences
        Tensor::<TB, 1>::from_floats([0.0, 1.0, 0.0, 0.0, 1.0, 1.0].as_slice(), device)
            .reshape([1, 2, 3])
    }

    #[test]
    fn test_verb_indicator_sums_across_sentences() {
        // verb of two sentences → 2.0, not 1.0
        let device = Default::default();
        let ind = verb_indicator(shared_verb_mask(&device), false);
        assert_eq!(ind.dims(), [1, 3, 1]);
        assert_eq!(ind.into_data().to_vec::<f32>().unwrap(), vec![0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_verb_indicator_clip_bounds_at_one() {
        let device = Default::default();
        let ind = verb_indicator(shared_verb_mask(&device), true);
        assert_eq!(ind.into_data().to_vec::<f32>().unwrap(), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_encoder_output_shape() {
        let device = Default::default();
        let encoder = TokenEncoderConfig::new(5, 4, 3).init::<TB>(&device);
        let embeddings = Tensor::<TB, 3>::ones([2, 3, 5], &device);
        let verbs = Tensor::<TB, 3>::zeros([2, 4, 3], &device);
        let out = encoder.forward(embeddings, verbs);
        assert_eq!(out.dims(), [2, 3, 6]);
    }
}
