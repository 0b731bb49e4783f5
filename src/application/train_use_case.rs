// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration  (Layer 3 - domain)
//   Step 2: Load training examples      (Layer 4 - data)
//   Step 3: Apply the optional subset   (Layer 4 - data)
//   Step 4: Load or hold out validation (Layer 4 - data)
//   Step 5: Build datasets              (Layer 4 - data)
//   Step 6: Save config                 (Layer 6 - infra)
//   Step 7: Run training loop           (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::SquadDataset,
    loader::NpzExampleSource,
    splitter::{split_train_val, take_subset},
};
use crate::domain::{
    errors::QaError,
    options::{CellKind, LayerSharing, ModelVariant, OptimizerKind},
    traits::ExampleSource,
};
use crate::infra::{checkpoint::CheckpointManager, metrics::TrainingStatistics};
use crate::ml::{model::SquadModelConfig, pipeline::PipelineConfig, trainer::run_training};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a training run, exactly as the user spelled it.
// Saved to save_dir/train_config.json so `evaluate` can rebuild
// the same model. String-typed choices are parsed by
// pipeline_config(), which is where bad values are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub embed_path:     String,
    pub train_path:     String,
    pub val_path:       Option<String>,
    pub save_dir:       String,
    pub hidden_size:    usize,
    pub batch_size:     usize,
    pub embed_dim:      usize,
    pub epochs:         usize,
    pub layers:         usize,
    pub cell_type:      String,
    pub lr:             f64,
    pub optim:          String,
    pub subset:         usize,
    pub variant:        String,
    pub mask_padding:   bool,
    pub layer_sharing:  String,
    pub project_logits: bool,
    pub val_fraction:   f64,
    pub seed:           u64,
    pub resume:         bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            embed_path:     "data/squad/glove.squad.100d.npy".to_string(),
            train_path:     "data/squad/train.npz".to_string(),
            val_path:       Some("data/squad/val.npz".to_string()),
            save_dir:       "save".to_string(),
            hidden_size:    200,
            batch_size:     32,
            embed_dim:      100,
            epochs:         10,
            layers:         2,
            cell_type:      "lstm".to_string(),
            lr:             0.01,
            optim:          "adam".to_string(),
            subset:         0,
            variant:        "bilstm".to_string(),
            mask_padding:   true,
            layer_sharing:  "independent".to_string(),
            project_logits: false,
            val_fraction:   0.1,
            seed:           42,
            resume:         false,
        }
    }
}

impl TrainConfig {
    /// Parse and validate into the immutable pipeline configuration.
    ///
    /// Nothing here touches a tensor, so a bad cell type or optimizer
    /// fails before any model state exists.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, QaError> {
        let cell_kind     = CellKind::from_str(&self.cell_type)?;
        let optimizer     = OptimizerKind::from_str(&self.optim)?;
        let variant       = ModelVariant::from_str(&self.variant)?;
        let layer_sharing = LayerSharing::from_str(&self.layer_sharing)?;

        for (name, value) in [
            ("hidden_size", self.hidden_size),
            ("embed_dim", self.embed_dim),
            ("layers", self.layers),
            ("batch_size", self.batch_size),
        ] {
            if value == 0 {
                return Err(QaError::Configuration(format!("{name} must be greater than 0")));
            }
        }
        if !self.lr.is_finite() || self.lr <= 0.0 {
            return Err(QaError::Configuration(format!("lr must be positive, got {}", self.lr)));
        }
        if !(0.0..1.0).contains(&self.val_fraction) {
            return Err(QaError::Configuration(format!(
                "val_fraction must be in [0, 1), got {}",
                self.val_fraction
            )));
        }

        let model = SquadModelConfig::new(
            variant,
            cell_kind,
            self.embed_dim,
            self.hidden_size,
            self.layers,
        )
        .with_layer_sharing(layer_sharing)
        .with_project_logits(self.project_logits);

        Ok(PipelineConfig {
            model,
            learning_rate: self.lr,
            optimizer,
            mask_padding: self.mask_padding,
        })
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingStatistics> {
        let cfg = &self.config;

        // ── Step 1: Validate before loading anything ──────────────────────────
        let pipeline_config = cfg
            .pipeline_config()
            .context("Invalid training configuration")?;

        // ── Step 2: Load training examples ────────────────────────────────────
        let source = NpzExampleSource::new(&cfg.train_path);
        tracing::info!("Loading training data from {}", source.describe());
        let examples = source
            .load_all()
            .with_context(|| format!("Cannot load training data from '{}'", cfg.train_path))?;

        // ── Step 3: Optional subset ───────────────────────────────────────────
        let examples = take_subset(examples, cfg.subset);

        // ── Step 4: Validation set ────────────────────────────────────────────
        let (train_examples, val_examples) = match &cfg.val_path {
            Some(path) => {
                let val = NpzExampleSource::new(path)
                    .load_all()
                    .with_context(|| format!("Cannot load validation data from '{path}'"))?;
                (examples, val)
            }
            None => split_train_val(examples, 1.0 - cfg.val_fraction, cfg.seed),
        };
        if train_examples.is_empty() {
            anyhow::bail!("No training examples left in '{}'", cfg.train_path);
        }
        if val_examples.is_empty() {
            tracing::warn!("Validation set is empty; validation loss will be reported as NaN");
        }
        tracing::info!(
            "Split: {} train, {} validation",
            train_examples.len(),
            val_examples.len()
        );

        // ── Step 5: Build Burn datasets ───────────────────────────────────────
        let train_dataset = SquadDataset::new(train_examples);
        let val_dataset   = SquadDataset::new(val_examples);
        tracing::debug!("{} answer tokens in training set", train_dataset.answer_token_count());

        // ── Step 6: Save config for evaluation ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.save_dir);
        ckpt_manager
            .save_config(cfg)
            .context("Cannot save training configuration")?;

        // ── Step 7: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, pipeline_config, train_dataset, val_dataset, ckpt_manager)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_flags() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.hidden_size, 200);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.embed_dim, 100);
        assert_eq!(cfg.epochs, 10);
        assert_eq!(cfg.layers, 2);
        assert_eq!(cfg.cell_type, "lstm");
        assert_eq!(cfg.lr, 0.01);
        assert_eq!(cfg.optim, "adam");
        assert_eq!(cfg.subset, 0);
    }

    #[test]
    fn test_pipeline_config_from_defaults() {
        let pipeline = TrainConfig::default().pipeline_config().unwrap();
        assert_eq!(pipeline.model.variant, ModelVariant::BiLstm);
        assert_eq!(pipeline.model.cell_kind, CellKind::Lstm);
        assert_eq!(pipeline.model.layer_sharing, LayerSharing::Independent);
        assert_eq!(pipeline.optimizer, OptimizerKind::Adam);
        assert!(pipeline.mask_padding);
    }

    #[test]
    fn test_rnn_cell_type_is_rejected() {
        let cfg = TrainConfig { cell_type: "rnn".into(), ..TrainConfig::default() };
        let err = cfg.pipeline_config().unwrap_err();
        assert!(matches!(err, QaError::UnsupportedCellType(ref s) if s == "rnn"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_adadelta_is_rejected() {
        let cfg = TrainConfig { optim: "adadelta".into(), ..TrainConfig::default() };
        assert!(matches!(cfg.pipeline_config(), Err(QaError::UnsupportedOptimizer(_))));
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        let cfg = TrainConfig { hidden_size: 0, ..TrainConfig::default() };
        assert!(cfg.pipeline_config().unwrap_err().is_configuration());
        let cfg = TrainConfig { lr: 0.0, ..TrainConfig::default() };
        assert!(cfg.pipeline_config().unwrap_err().is_configuration());
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = TrainConfig { val_path: None, variant: "baseline".into(), ..TrainConfig::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_missing_train_file_fails_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            train_path: dir.path().join("missing.npz").display().to_string(),
            save_dir:   dir.path().join("save").display().to_string(),
            ..TrainConfig::default()
        };
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("Cannot load training data"));
        assert!(!dir.path().join("save").exists());
    }
}
