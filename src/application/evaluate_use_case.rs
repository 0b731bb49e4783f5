// ============================================================
// Layer 2 - EvaluateUseCase
// ============================================================
// Rebuilds the model a training run saved and reports its
// loss on a held-out .npz archive:
//
//   Step 1: Read train_config.json from save_dir   (Layer 6)
//   Step 2: Load the evaluation examples           (Layer 4)
//   Step 3: Restore the latest checkpoint + score  (Layer 5)

use anyhow::{Context, Result};

use crate::application::train_use_case::TrainConfig;
use crate::data::{dataset::SquadDataset, loader::NpzExampleSource};
use crate::domain::traits::ExampleSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::run_evaluation;

pub struct EvaluateUseCase {
    save_dir:   String,
    data_path:  String,
    embed_path: Option<String>,
    batch_size: Option<usize>,
}

impl EvaluateUseCase {
    pub fn new(
        save_dir:   String,
        data_path:  String,
        embed_path: Option<String>,
        batch_size: Option<usize>,
    ) -> Self {
        Self { save_dir, data_path, embed_path, batch_size }
    }

    /// Settings of the run that produced the checkpoint, with the
    /// command-line overrides applied.
    pub fn resolved_config(&self) -> Result<TrainConfig> {
        let ckpt = CheckpointManager::new(&self.save_dir);
        let mut cfg: TrainConfig = ckpt.load_config().with_context(|| {
            format!("Cannot read the run configuration in '{}'. Have you run 'train' first?", self.save_dir)
        })?;
        if let Some(path) = &self.embed_path {
            cfg.embed_path = path.clone();
        }
        if let Some(batch_size) = self.batch_size {
            cfg.batch_size = batch_size;
        }
        Ok(cfg)
    }

    /// Mean per-batch loss of the latest checkpoint on `data_path`.
    pub fn execute(&self) -> Result<f64> {
        let cfg = self.resolved_config()?;

        let examples = NpzExampleSource::new(&self.data_path)
            .load_all()
            .with_context(|| format!("Cannot load evaluation data from '{}'", self.data_path))?;
        if examples.is_empty() {
            anyhow::bail!("No examples in '{}'", self.data_path);
        }
        tracing::info!("Evaluating on {} examples", examples.len());

        let ckpt = CheckpointManager::new(&self.save_dir);
        run_evaluation(&cfg, SquadDataset::new(examples), &ckpt)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_to_saved_config() {
        let dir = tempfile::tempdir().unwrap();
        let saved = TrainConfig { hidden_size: 16, batch_size: 8, ..TrainConfig::default() };
        CheckpointManager::new(dir.path()).save_config(&saved).unwrap();

        let use_case = EvaluateUseCase::new(
            dir.path().display().to_string(),
            "val.npz".into(),
            Some("other.npy".into()),
            Some(64),
        );
        let cfg = use_case.resolved_config().unwrap();
        assert_eq!(cfg.hidden_size, 16);
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.embed_path, "other.npy");
    }

    #[test]
    fn test_missing_run_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let use_case = EvaluateUseCase::new(dir.path().display().to_string(), "val.npz".into(), None, None);
        let err = use_case.execute().unwrap_err();
        assert!(err.to_string().contains("Have you run 'train' first?"));
    }
}
