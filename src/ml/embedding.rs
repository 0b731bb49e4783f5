// ============================================================
// Layer 5 - Embedding Table
// ============================================================
// Frozen pretrained word vectors (GloVe in the reference
// setup), stored as a (vocab_size, embed_dim) .npy matrix.
//
// Loading is lazy: the first lookup reads the file and caches
// the matrix on the device; later lookups reuse it for the
// lifetime of the table. The cache is a OnceLock, so even two
// racing first lookups end up sharing the single value that
// was stored first.
//
// The table is not a Module: it has no trainable parameters
// and is never written to a checkpoint.

use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use burn::{prelude::*, tensor::TensorData};
use ndarray::Array2;
use ndarray_npy::read_npy;

use crate::domain::{batch::SequenceBatch, errors::QaError};
use crate::ml::tensors::token_ids;

struct LoadedTable<B: Backend> {
    weights:    Tensor<B, 2>,
    vocab_size: usize,
}

pub struct EmbeddingTable<B: Backend> {
    path:      Option<PathBuf>,
    embed_dim: usize,
    device:    B::Device,
    table:     OnceLock<LoadedTable<B>>,
}

impl<B: Backend> EmbeddingTable<B> {
    /// A table that loads `path` on first use.
    pub fn from_path(path: impl Into<PathBuf>, embed_dim: usize, device: &B::Device) -> Self {
        Self {
            path: Some(path.into()),
            embed_dim,
            device: device.clone(),
            table: OnceLock::new(),
        }
    }

    /// A table backed by an in-memory matrix; nothing is loaded later.
    pub fn from_matrix(matrix: Array2<f32>, device: &B::Device) -> Self {
        let embed_dim = matrix.ncols();
        let table = OnceLock::new();
        let _ = table.set(upload(matrix, device));
        Self { path: None, embed_dim, device: device.clone(), table }
    }

    pub fn embed_dim(&self) -> usize { self.embed_dim }

    pub fn is_loaded(&self) -> bool { self.table.get().is_some() }

    /// Vocabulary size, loading the table if needed.
    pub fn vocab_size(&self) -> Result<usize, QaError> {
        Ok(self.loaded()?.vocab_size)
    }

    /// Look up every id of `batch`: (batch, max_len) -> (batch, max_len, embed_dim).
    ///
    /// Padding ids are looked up too, so they must also be in range.
    pub fn lookup(&self, batch: &SequenceBatch) -> Result<Tensor<B, 3>, QaError> {
        let table = self.loaded()?;

        if let Some(&id) = batch.token_ids().iter().find(|&&id| id as usize >= table.vocab_size) {
            return Err(QaError::OutOfVocabulary { id, vocab_size: table.vocab_size });
        }

        let (rows, cols) = (batch.batch_size(), batch.max_len());
        let ids = token_ids::<B>(batch, &self.device).reshape([rows * cols]);

        Ok(table
            .weights
            .clone()
            .select(0, ids)
            .reshape([rows, cols, self.embed_dim]))
    }

    fn loaded(&self) -> Result<&LoadedTable<B>, QaError> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }

        let path = self.path.as_deref().ok_or_else(|| {
            QaError::data_load("<memory>", "embedding table has neither a matrix nor a path")
        })?;
        let matrix = load_matrix(path, self.embed_dim)?;
        tracing::info!(
            "Loaded embeddings from '{}': {} x {}",
            path.display(),
            matrix.nrows(),
            matrix.ncols()
        );

        // A racing loader may have stored first; its value wins.
        Ok(self.table.get_or_init(|| upload(matrix, &self.device)))
    }
}

/// Read a (vocab, embed_dim) float matrix from an .npy file.
/// float32 is read as is, float64 is narrowed.
pub fn load_matrix(path: &Path, embed_dim: usize) -> Result<Array2<f32>, QaError> {
    let origin = path.display().to_string();
    if !path.is_file() {
        return Err(QaError::data_load(origin, "embedding file does not exist"));
    }

    let matrix: Array2<f32> = match read_npy::<_, Array2<f32>>(path) {
        Ok(m) => m,
        Err(f32_err) => read_npy::<_, Array2<f64>>(path)
            .map(|m| m.mapv(|v| v as f32))
            .map_err(|_| QaError::data_load(origin.clone(), f32_err.to_string()))?,
    };

    if matrix.ncols() != embed_dim {
        return Err(QaError::data_load(
            origin,
            format!("embedding width {} does not match embed_dim {embed_dim}", matrix.ncols()),
        ));
    }
    if matrix.nrows() == 0 {
        return Err(QaError::data_load(origin, "embedding matrix has no rows"));
    }
    Ok(matrix)
}

fn upload<B: Backend>(matrix: Array2<f32>, device: &B::Device) -> LoadedTable<B> {
    let (vocab_size, embed_dim) = matrix.dim();
    let values: Vec<f32> = matrix.iter().copied().collect();
    let weights = Tensor::from_data(
        TensorData::new(values, [vocab_size, embed_dim]).convert::<B::FloatElem>(),
        device,
    );
    LoadedTable { weights, vocab_size }
}
