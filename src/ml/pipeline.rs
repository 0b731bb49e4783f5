// ============================================================
// Layer 5 - QaPipeline
// ============================================================
// Owns everything a training run mutates or reads:
//
//   config      - immutable PipelineConfig
//   model       - SquadModel (question encoder, passage
//                 encoder, classifier)
//   optim       - Adam (or SGD) with its moment estimates
//   embeddings  - frozen, lazily loaded EmbeddingTable
//   device      - where every tensor lives
//
// Public operations:
//   train(batch)    -> forward + backward + one optimizer step
//   evaluate(batch) -> forward + loss on the inner backend,
//                      no parameter or optimizer mutation
//   checkpoint / restore_from_checkpoint
//
// `train` takes &mut self and swaps in the updated model only
// after the optimizer step has returned, so nobody can see a
// half-updated parameter set.
//
// Reference: Kingma & Ba (2015) Adam

use std::path::{Path, PathBuf};

use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::{batch::SquadBatch, errors::QaError, options::OptimizerKind};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    embedding::EmbeddingTable,
    loss::token_cross_entropy,
    model::{SquadModel, SquadModelConfig},
    tensors,
};

/// Everything the pipeline needs to know, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model:         SquadModelConfig,
    pub learning_rate: f64,
    pub optimizer:     OptimizerKind,
    /// Average the loss over real passage tokens only.
    pub mask_padding:  bool,
}

/// A minibatch whose question and passage are already embedded.
///
/// This is the entry point of the baseline variant, whose inputs
/// arrive pre-embedded.
#[derive(Debug, Clone)]
pub struct EmbeddedBatch<B: Backend> {
    pub question:         Tensor<B, 3>,
    pub question_lengths: Vec<usize>,
    pub passage:          Tensor<B, 3>,
    pub passage_lengths:  Vec<usize>,
    pub labels:           Tensor<B, 2, Int>,
}

impl<B: AutodiffBackend> EmbeddedBatch<B> {
    /// Same batch on the non-autodiff backend.
    pub fn inner(self) -> EmbeddedBatch<B::InnerBackend> {
        EmbeddedBatch {
            question:         self.question.inner(),
            question_lengths: self.question_lengths,
            passage:          self.passage.inner(),
            passage_lengths:  self.passage_lengths,
            labels:           self.labels.inner(),
        }
    }
}

pub struct QaPipeline<B: AutodiffBackend, O> {
    config:     PipelineConfig,
    model:      SquadModel<B>,
    optim:      O,
    embeddings: EmbeddingTable<B>,
    device:     B::Device,
}

impl<B, O> QaPipeline<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SquadModel<B>, B>,
{
    /// Build the model from `config` and pair it with `optim`.
    pub fn new(
        config:     PipelineConfig,
        embeddings: EmbeddingTable<B>,
        optim:      O,
        device:     &B::Device,
    ) -> Result<Self, QaError> {
        if config.model.embed_dim != embeddings.embed_dim() {
            return Err(QaError::Configuration(format!(
                "model embed_dim {} does not match embedding table width {}",
                config.model.embed_dim,
                embeddings.embed_dim()
            )));
        }
        if !config.learning_rate.is_finite() || config.learning_rate <= 0.0 {
            return Err(QaError::Configuration(format!(
                "learning rate must be positive, got {}",
                config.learning_rate
            )));
        }

        let model = config.model.init::<B>(device)?;
        tracing::info!(
            "Pipeline ready: variant={:?} cell={} hidden={} layers={} params={}",
            config.model.variant,
            config.model.cell_kind,
            config.model.hidden_size,
            config.model.layers,
            model.num_params()
        );

        Ok(Self { config, model, optim, embeddings, device: device.clone() })
    }

    /// Trainable scalar count.
    pub fn num_parameters(&self) -> usize {
        self.model.num_params()
    }

    /// Look up question and passage ids and move labels to the device.
    pub fn embed(&self, batch: &SquadBatch) -> Result<EmbeddedBatch<B>, QaError> {
        let batch = self.prepare(batch);
        Ok(EmbeddedBatch {
            question:         self.embeddings.lookup(&batch.questions)?,
            question_lengths: batch.questions.lengths().to_vec(),
            passage:          self.embeddings.lookup(&batch.passages)?,
            passage_lengths:  batch.passages.lengths().to_vec(),
            labels:           tensors::labels(&batch, &self.device),
        })
    }

    /// One optimizer step on `batch`. Returns the loss before the update.
    pub fn train(&mut self, batch: &SquadBatch) -> Result<f64, QaError> {
        let embedded = self.embed(batch)?;
        Ok(self.train_embedded(embedded))
    }

    pub fn train_embedded(&mut self, batch: EmbeddedBatch<B>) -> f64 {
        let loss = batch_loss(&self.model, batch, self.config.mask_padding);
        let value = loss.clone().into_scalar().elem::<f64>();

        // Backward pass + optimizer update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.config.learning_rate, self.model.clone(), grads);

        tracing::debug!("train step loss={:.6}", value);
        value
    }

    /// Loss on `batch` without touching parameters or optimizer state.
    pub fn evaluate(&self, batch: &SquadBatch) -> Result<f64, QaError> {
        let embedded = self.embed(batch)?;
        Ok(self.evaluate_embedded(embedded))
    }

    pub fn evaluate_embedded(&self, batch: EmbeddedBatch<B>) -> f64 {
        // valid() drops the autodiff graph
        let model = self.model.valid();
        batch_loss(&model, batch.inner(), self.config.mask_padding)
            .into_scalar()
            .elem::<f64>()
    }

    /// Write model and optimizer records for `epoch` under `dir`.
    pub fn checkpoint(&self, dir: impl AsRef<Path>, epoch: usize) -> Result<PathBuf, QaError> {
        CheckpointManager::new(dir.as_ref()).save_training_state(&self.model, &self.optim, epoch)
    }

    /// Replace parameters and optimizer state with the latest checkpoint under `dir`.
    ///
    /// Fails with CheckpointNotFound when nothing was saved there.
    pub fn restore_from_checkpoint(self, dir: impl AsRef<Path>) -> Result<Self, QaError> {
        let Self { config, model, optim, embeddings, device } = self;
        let (model, optim, epoch) =
            CheckpointManager::new(dir.as_ref()).load_training_state(model, optim, &device)?;
        tracing::info!("Restored pipeline from epoch {} in '{}'", epoch, dir.as_ref().display());
        Ok(Self { config, model, optim, embeddings, device })
    }

    /// Drop trailing padding when it cannot change the loss.
    fn prepare(&self, batch: &SquadBatch) -> SquadBatch {
        if self.config.mask_padding {
            batch.trimmed()
        } else {
            batch.clone()
        }
    }
}

/// Forward pass + per-token loss, on any backend.
fn batch_loss<B: Backend>(
    model:        &SquadModel<B>,
    batch:        EmbeddedBatch<B>,
    mask_padding: bool,
) -> Tensor<B, 1> {
    let logits = model.forward(
        batch.question,
        &batch.question_lengths,
        batch.passage,
        &batch.passage_lengths,
    );
    let lengths = mask_padding.then_some(batch.passage_lengths.as_slice());
    token_cross_entropy(logits, batch.labels, lengths)
}
