// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model math lives here, generic over the Burn backend.
//
//   encoder.rs    — TokenEncoder: projection of the external
//                   token vectors + verb indicator, BiLSTM
//
//   aggregator.rs — zero-safe masked means turning token
//                   representations into per-sentence entity
//                   and verb vectors
//
//   decoder.rs    — StateTracker: sentence-level BiLSTM producing
//                   decoder states and tag emission scores
//
//   crf.rs        — linear-chain CRF: negative log-likelihood by
//                   the forward algorithm, Viterbi decoding
//
//   location.rs   — LocationHead: per-sentence candidate scores
//                   and the location loss
//
//   model.rs      — NcetModel composition and the TrainStep
//                   interface shared by training and evaluation
//
//   trainer.rs    — training loop with periodic evaluation,
//                   checkpointing and early stopping
//
//   inferencer.rs — Predictor: checkpoint loading, evaluation
//                   and prediction without autodiff
//
//   backend.rs    — --device selection (NdArray or Wgpu)
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Gupta & Durrett (2019) Tracking Discrete and Continuous
//            Entity State for Process Understanding

pub mod encoder;
pub mod aggregator;
pub mod decoder;
pub mod crf;
pub mod location;

/// Full model and the TrainStep interface
pub mod model;

/// Training loop with dev evaluation and checkpointing
pub mod trainer;

/// Inference engine — loads a checkpoint, evaluates and predicts
pub mod inferencer;

pub mod backend;

pub(crate) mod host;
