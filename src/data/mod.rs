// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a dataset file on disk and a padded tensor
// batch on the device:
//
//   dataset .json
//       │
//       ▼
//   JsonInstanceLoader  → parses + validates EntityInstances
//       │
//       ▼
//   ProparaDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   ProparaBatcher      → pads, embeds tokens (TokenEmbedder),
//       │                 builds masks and gold tensors
//       ▼
//   DataLoader          → feeds batches to training / decoding
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads JSON dataset files
pub mod loader;

/// Implements Burn's Dataset trait for entity instances
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Adapters for the external token embedding service
pub mod embedder;

#[cfg(test)]
pub(crate) mod fixtures;
