// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types that describe the problem:
//   - what a SQuAD example and a padded batch look like
//   - which model options exist
//   - which errors the system can raise
//
// No Burn types, no file I/O. Everything here is testable
// without a device.

/// Error taxonomy shared by every library layer
pub mod errors;

/// One validated, padded SQuAD example
pub mod example;

/// Padded sequence batches and minibatches
pub mod batch;

/// Cell kind, model variant, layer sharing, optimizer choice
pub mod options;

/// Abstractions implemented by the data layer
pub mod traits;
