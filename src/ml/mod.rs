// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All Burn tensor code lives here.
//
//   tensors.rs   - host Vec <-> tensor helpers, length masks
//   embedding.rs - frozen, lazily loaded word vectors
//   cell.rs      - LSTM and GRU cells, one time step at a time
//   encoder.rs   - length-aware multi-layer scan, optional
//                  backward direction
//   model.rs     - question encoder -> passage encoder ->
//                  2-class recurrent classifier
//   loss.rs      - per-token cross-entropy, masked or not
//   pipeline.rs  - model + optimizer + embeddings: train,
//                  evaluate, checkpoint, restore
//   trainer.rs   - epoch loop, validation, artifacts
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Hochreiter & Schmidhuber (1997) LSTM
//            Cho et al. (2014) GRU

/// Tensor construction helpers
pub mod tensors;

/// Pretrained embedding lookup
pub mod embedding;

/// Recurrent cells
pub mod cell;

/// Recurrent encoders
pub mod encoder;

/// The QA model
pub mod model;

/// Token-level loss
pub mod loss;

/// Train / evaluate / checkpoint facade
pub mod pipeline;

/// Full training loop with validation and checkpointing
pub mod trainer;
