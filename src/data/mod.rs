// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// From preprocessed numpy archives to host-side minibatches:
//
//   train.npz / val.npz
//       │
//       ▼
//   NpzExampleSource  → reads the five aligned arrays
//       │
//       ▼
//   splitter          → optional subset, optional held-out split
//       │
//       ▼
//   SquadDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   SquadBatcher      → pads examples into a SquadBatch
//       │
//       ▼
//   DataLoader        → shuffled minibatches for the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads SQuAD arrays from .npz archives
pub mod loader;

/// Implements Burn's Dataset trait for SQuAD examples
pub mod dataset;

/// Implements Burn's Batcher trait to pad examples into batches
pub mod batcher;

/// Subsets and splits data into train/validation sets
pub mod splitter;
