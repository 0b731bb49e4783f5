// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Saves and restores the full training state with Burn's
// NamedMpkGzFileRecorder at full precision, so a restored
// pipeline reproduces the saved losses exactly.
//
// What gets saved per checkpoint:
//   1. Model parameters  (model_epoch_{n}.mpk.gz)
//   2. Optimizer state   (optim_epoch_{n}.mpk.gz), which holds
//                        the Adam moment estimates
//   3. latest_epoch.json (which epoch was last saved)
//
// train_config.json is written once per run so `evaluate`
// can rebuild the same architecture before loading weights.
//
// Layout:
//   save_dir/
//     model_epoch_1.mpk.gz
//     optim_epoch_1.mpk.gz
//     ...
//     latest_epoch.json
//     train_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::errors::QaError;
use crate::ml::model::SquadModel;

type StateRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const CONFIG_FILE: &str = "train_config.json";
const RECORD_EXTENSION: &str = "mpk.gz";

/// Reads and writes checkpoints in one directory.
///
/// Nothing touches the filesystem until the first save.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write model + optimizer records for `epoch` and move the
    /// latest-epoch pointer to it. Returns the model record path.
    pub fn save_training_state<B, O>(
        &self,
        model: &SquadModel<B>,
        optim: &O,
        epoch: usize,
    ) -> Result<PathBuf, QaError>
    where
        B: AutodiffBackend,
        O: Optimizer<SquadModel<B>, B>,
    {
        self.ensure_dir()?;
        let recorder = StateRecorder::new();

        let model_path = self.record_stem("model", epoch);
        <StateRecorder as Recorder<B>>::record(&recorder, model.clone().into_record(), model_path.clone())
            .map_err(|e| self.checkpoint_error(&model_path, e))?;

        let optim_path = self.record_stem("optim", epoch);
        <StateRecorder as Recorder<B>>::record(&recorder, optim.to_record(), optim_path.clone())
            .map_err(|e| self.checkpoint_error(&optim_path, e))?;

        // The pointer moves only once both records are on disk
        self.write_json(LATEST_EPOCH_FILE, &epoch)?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(model_path.with_extension(RECORD_EXTENSION))
    }

    /// Load the latest saved state into `model` and `optim`.
    ///
    /// Returns the restored pair and the epoch they were saved at.
    pub fn load_training_state<B, O>(
        &self,
        model:  SquadModel<B>,
        optim:  O,
        device: &B::Device,
    ) -> Result<(SquadModel<B>, O, usize), QaError>
    where
        B: AutodiffBackend,
        O: Optimizer<SquadModel<B>, B>,
    {
        let epoch = self.latest_epoch()?;
        let model_path = self.existing_record("model", epoch)?;
        let optim_path = self.existing_record("optim", epoch)?;

        tracing::info!("Loading checkpoint from epoch {}", epoch);
        let recorder = StateRecorder::new();

        let model_record = <StateRecorder as Recorder<B>>::load(&recorder, model_path.clone(), device)
            .map_err(|e| self.checkpoint_error(&model_path, e))?;
        let optim_record = <StateRecorder as Recorder<B>>::load(&recorder, optim_path.clone(), device)
            .map_err(|e| self.checkpoint_error(&optim_path, e))?;

        Ok((model.load_record(model_record), optim.load_record(optim_record), epoch))
    }

    /// Persist the run configuration as pretty JSON.
    pub fn save_config<C: Serialize>(&self, config: &C) -> Result<(), QaError> {
        self.ensure_dir()?;
        self.write_json(CONFIG_FILE, config)?;
        tracing::debug!("Saved training config to '{}'", self.dir.join(CONFIG_FILE).display());
        Ok(())
    }

    pub fn load_config<C: DeserializeOwned>(&self) -> Result<C, QaError> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .map_err(|_| QaError::CheckpointNotFound(path.display().to_string()))?;
        serde_json::from_str(&json).map_err(|e| self.checkpoint_error(&path, e))
    }

    /// Epoch named by latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize, QaError> {
        let path = self.dir.join(LATEST_EPOCH_FILE);
        let s = fs::read_to_string(&path)
            .map_err(|_| QaError::CheckpointNotFound(path.display().to_string()))?;
        serde_json::from_str::<usize>(s.trim()).map_err(|e| self.checkpoint_error(&path, e))
    }

    /// True when a latest-epoch pointer exists.
    pub fn has_checkpoint(&self) -> bool {
        self.dir.join(LATEST_EPOCH_FILE).is_file()
    }

    // ─── Helpers ────────────────────────────────────────────────────────────

    /// Path without extension; the recorder appends `.mpk.gz`.
    fn record_stem(&self, kind: &str, epoch: usize) -> PathBuf {
        self.dir.join(format!("{kind}_epoch_{epoch}"))
    }

    fn existing_record(&self, kind: &str, epoch: usize) -> Result<PathBuf, QaError> {
        let stem = self.record_stem(kind, epoch);
        let file = stem.with_extension(RECORD_EXTENSION);
        if file.is_file() {
            Ok(stem)
        } else {
            Err(QaError::CheckpointNotFound(file.display().to_string()))
        }
    }

    fn ensure_dir(&self) -> Result<(), QaError> {
        fs::create_dir_all(&self.dir).map_err(|e| self.checkpoint_error(&self.dir, e))
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), QaError> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value).map_err(|e| self.checkpoint_error(&path, e))?;
        fs::write(&path, json).map_err(|e| self.checkpoint_error(&path, e))
    }

    fn checkpoint_error(&self, path: &Path, reason: impl ToString) -> QaError {
        QaError::Checkpoint { path: path.display().to_string(), reason: reason.to_string() }
    }
}
