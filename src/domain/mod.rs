// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types and rules of the tracking task.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain structs, enums, traits and pure functions
//
// The consistency post-processor has no learned parameters, so it
// is tested here without a backend.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Closed set of state tags and location sentinels
pub mod state;

/// A (paragraph, entity) pair with masks and gold sequences
pub mod instance;

/// Tag/location consistency rules and final prediction formatting
pub mod consistency;

/// Core abstractions (traits) that other layers implement
pub mod traits;
