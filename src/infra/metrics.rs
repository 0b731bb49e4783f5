// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Two artifacts per training run, both in save_dir:
//
//   metrics.csv      - one row appended after every epoch
//                      epoch,train_loss,val_loss
//   statistics.json  - written once training ends: per-epoch
//                      average train loss and validation loss
//
// Loss should go down epoch over epoch. A val_loss that rises
// while train_loss keeps falling means overfitting.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::errors::QaError;

const CSV_HEADER: &str = "epoch,train_loss,val_loss";
const STATISTICS_FILE: &str = "statistics.json";

/// One row of metrics for a single epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch: usize,

    /// Mean of the per-batch training losses
    pub train_loss: f64,

    /// Mean of the per-batch validation losses
    pub val_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }

    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Summary written to statistics.json at the end of training.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStatistics {
    pub epoch_losses:   Vec<f64>,
    /// None for epochs that had no validation batches
    pub val_losses:     Vec<Option<f64>>,
    pub best_epoch:     Option<usize>,
    pub num_parameters: usize,
}

impl TrainingStatistics {
    pub fn new(num_parameters: usize) -> Self {
        Self { num_parameters, ..Self::default() }
    }

    pub fn record(&mut self, m: &EpochMetrics) {
        let best = self.val_losses.iter().flatten().copied().fold(f64::INFINITY, f64::min);
        if m.is_improvement(best) {
            self.best_epoch = Some(m.epoch);
        }
        self.epoch_losses.push(m.train_loss);
        self.val_losses.push(m.val_loss.is_finite().then_some(m.val_loss));
    }

    /// Statistics saved by an earlier run in `dir`, if any.
    pub fn load(dir: &Path) -> Result<Option<Self>, QaError> {
        let path = dir.join(STATISTICS_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        serde_json::from_str(&json).map(Some).map_err(|e| io_error(&path, e))
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf, QaError> {
        let path = dir.join(STATISTICS_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| io_error(&path, e))?;
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        fs::write(&path, json).map_err(|e| io_error(&path, e))?;
        tracing::info!("Saved training statistics to '{}'", path.display());
        Ok(path)
    }
}

/// Appends epoch metrics to save_dir/metrics.csv.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only if the file is new, so resumed
    /// runs keep appending to the same log.
    pub fn new(dir: &Path) -> Result<Self, QaError> {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path).map_err(|e| io_error(&csv_path, e))?;
            writeln!(f, "{CSV_HEADER}").map_err(|e| io_error(&csv_path, e))?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<(), QaError> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| io_error(&self.csv_path, e))?;

        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.val_loss)
            .map_err(|e| io_error(&self.csv_path, e))?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

fn io_error(path: &Path, reason: impl ToString) -> QaError {
    QaError::Checkpoint { path: path.display().to_string(), reason: reason.to_string() }
}
