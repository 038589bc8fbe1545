// ============================================================
// Layer 5 — Sentence-Level State Decoder
// ============================================================
// sentence representations [B,S,4H]
//     │  BiLSTM(4H → H)
//     ▼
// decoder states [B,S,2H] ──────────────► LocationHead
//     │  dropout
//     │  Linear(2H → NUM_STATES)
//     ▼
// tag emission scores [B,S,6] ──────────► Crf

use burn::{
    nn::{BiLstm, BiLstmConfig, Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    prelude::*,
};

use crate::domain::state::NUM_STATES;

#[derive(Config, Debug)]
pub struct StateTrackerConfig {
    pub hidden_size: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl StateTrackerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> StateTracker<B> {
        let h = self.hidden_size;
        StateTracker {
            lstm:       BiLstmConfig::new(4 * h, h, true).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
            hidden2tag: LinearConfig::new(2 * h, NUM_STATES)
                .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                .init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct StateTracker<B: Backend> {
    pub lstm:       BiLstm<B>,
    pub dropout:    Dropout,
    pub hidden2tag: Linear<B>,
}

impl<B: Backend> StateTracker<B> {
    /// sentences: [B, S, 4H] → (decoder states [B, S, 2H], emissions [B, S, NUM_STATES])
    pub fn forward(&self, sentences: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let [batch, sents, _] = sentences.dims();

        let (hidden, _) = self.lstm.forward(sentences, None);
        let hidden = self.dropout.forward(hidden);
        let emissions = self.hidden2tag.forward(hidden.clone());

        assert_eq!(emissions.dims(), [batch, sents, NUM_STATES]);
        (hidden, emissions)
    }
}
