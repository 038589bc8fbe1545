// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs    — Saving and loading model weights with
//                      Burn's CompactRecorder, the best-checkpoint
//                      pointer, and train_config.json so inference
//                      can rebuild the exact model.
//
//   metrics.rs       — Running loss/accuracy statistics and the
//                      metrics.csv logger (one row per evaluation
//                      round).
//
//   run_log.rs       — tracing subscriber setup: stdout plus an
//                      optional per-run log file that is synced
//                      when the handle drops.
//
//   output_writer.rs — Fills the tab-separated evaluation template
//                      with (state, location before, location
//                      after) predictions.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics and CSV logger
pub mod metrics;

/// Logging setup and the per-run log file
pub mod run_log;

/// Prediction template filling
pub mod output_writer;
