// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams where external collaborators plug in.
//
//   TokenEmbedder   — the pretrained contextual embedding service.
//                     The tracker treats it as a frozen black box:
//                     tokens in, one dense vector per token out.
//                     Implementations live in data::embedder.
//
//   InstanceSource  — anything that can produce entity instances
//                     (a JSON dataset file today).
//
// Programming against these traits keeps the model and the
// training loop unaware of where vectors and data come from.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::fmt::Debug;

use crate::domain::instance::EntityInstance;

// ─── TokenEmbedder ────────────────────────────────────────────────────────────
/// Produces one fixed-width vector per token of a paragraph.
///
/// Called once per batch from the data loader worker, hence `Send + Sync`.
/// Implementations must be infallible at this point: anything that can go
/// wrong (missing files, malformed dumps) is reported when they are built.
pub trait TokenEmbedder: Send + Sync + Debug {
    /// Width of every returned vector
    fn dim(&self) -> usize;

    /// Embed the tokens of paragraph `para_id`.
    /// Returns exactly `tokens.len()` vectors of length `dim()`.
    fn embed(&self, para_id: u32, tokens: &[String]) -> Vec<Vec<f32>>;
}

// ─── InstanceSource ───────────────────────────────────────────────────────────
/// Any component that can load entity instances.
///
/// Implementations:
///   - JsonInstanceLoader → reads a dataset file
pub trait InstanceSource {
    fn load_all(&self) -> Result<Vec<EntityInstance>>;
}
