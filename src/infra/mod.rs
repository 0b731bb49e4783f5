// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Filesystem concerns shared by training and evaluation:
//
//   checkpoint.rs - model + optimizer records per epoch, the
//                   latest-epoch pointer, and the run config
//                   as JSON so `evaluate` can rebuild the model
//
//   metrics.rs    - per-epoch CSV log and the end-of-run
//                   statistics.json summary
//
// Reference: Burn Book §5 (Checkpointing)

/// Model and optimizer checkpoints
pub mod checkpoint;

/// Training metrics CSV and statistics
pub mod metrics;
