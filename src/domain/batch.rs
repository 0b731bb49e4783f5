// ============================================================
// Layer 3 - Sequence Batches
// ============================================================
// A SequenceBatch is a padded (batch, max_len) grid of token
// ids plus the true length of every row:
//
//   ids (max_len = 5)        lengths
//   [ 12  40   7   0   0 ]   3
//   [ 81   2  19  33  64 ]   5
//
// Positions at or beyond a row's length are padding and must
// never influence a length-aware computation.
//
// A SquadBatch pairs a question batch with a passage batch
// and carries one 0/1 label per padded passage position.
//
// These are plain host-side types; the ml layer turns them
// into tensors on whatever device the pipeline runs on.

use crate::domain::{errors::QaError, example::SquadExample};

/// Reserved id used to right-pad every sequence.
pub const PAD_ID: u32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceBatch {
    token_ids: Vec<u32>,
    lengths:   Vec<usize>,
    max_len:   usize,
}

impl SequenceBatch {
    /// Build a batch from row-major ids.
    pub fn new(token_ids: Vec<u32>, lengths: Vec<usize>, max_len: usize) -> Result<Self, QaError> {
        if lengths.is_empty() {
            return Err(QaError::data_load("batch", "a batch needs at least one sequence"));
        }
        if max_len == 0 {
            return Err(QaError::data_load("batch", "padded length must be at least 1"));
        }
        if token_ids.len() != lengths.len() * max_len {
            return Err(QaError::data_load(
                "batch",
                format!(
                    "expected {} ids for {} rows of width {max_len}, got {}",
                    lengths.len() * max_len,
                    lengths.len(),
                    token_ids.len()
                ),
            ));
        }
        if let Some(&len) = lengths.iter().find(|&&l| l > max_len) {
            return Err(QaError::data_load(
                "batch",
                format!("length {len} exceeds padded width {max_len}"),
            ));
        }
        Ok(Self { token_ids, lengths, max_len })
    }

    /// Build a batch from ragged rows, right-padding each one with PAD_ID.
    pub fn from_rows(rows: &[Vec<u32>], lengths: &[usize]) -> Result<Self, QaError> {
        if rows.len() != lengths.len() {
            return Err(QaError::data_load(
                "batch",
                format!("{} rows but {} lengths", rows.len(), lengths.len()),
            ));
        }
        let width = padded_width(rows.iter().map(|r| r.as_slice()), lengths);
        let mut ids = Vec::with_capacity(rows.len() * width);
        for row in rows {
            ids.extend_from_slice(row);
            ids.resize(ids.len() + (width - row.len()), PAD_ID);
        }
        Self::new(ids, lengths.to_vec(), width)
    }

    pub fn batch_size(&self) -> usize { self.lengths.len() }

    pub fn max_len(&self) -> usize { self.max_len }

    pub fn lengths(&self) -> &[usize] { &self.lengths }

    pub fn token_ids(&self) -> &[u32] { &self.token_ids }

    pub fn row(&self, i: usize) -> &[u32] {
        &self.token_ids[i * self.max_len..(i + 1) * self.max_len]
    }

    /// Longest true length in the batch, never below 1.
    pub fn longest(&self) -> usize {
        self.lengths.iter().copied().max().unwrap_or(0).max(1)
    }

    /// Drop trailing columns so the padded width becomes `width`.
    /// The width is clamped to [longest, max_len] so no real token is lost.
    pub fn truncated(&self, width: usize) -> Self {
        let width = width.clamp(self.longest(), self.max_len);
        let token_ids = (0..self.batch_size())
            .flat_map(|i| self.row(i)[..width].iter().copied())
            .collect();
        Self { token_ids, lengths: self.lengths.clone(), max_len: width }
    }
}

/// One minibatch: questions, passages and per-passage-token labels.
#[derive(Debug, Clone, PartialEq)]
pub struct SquadBatch {
    pub questions: SequenceBatch,
    pub passages:  SequenceBatch,
    labels:        Vec<u32>,
}

impl SquadBatch {
    pub fn new(questions: SequenceBatch, passages: SequenceBatch, labels: Vec<u32>) -> Result<Self, QaError> {
        if questions.batch_size() != passages.batch_size() {
            return Err(QaError::data_load(
                "batch",
                format!(
                    "{} questions but {} passages",
                    questions.batch_size(),
                    passages.batch_size()
                ),
            ));
        }
        if labels.len() != passages.token_ids().len() {
            return Err(QaError::data_load(
                "batch",
                format!("{} labels for {} passage positions", labels.len(), passages.token_ids().len()),
            ));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(QaError::data_load("batch", format!("answer label {bad} is not 0 or 1")));
        }
        Ok(Self { questions, passages, labels })
    }

    /// Stack validated examples into a batch. Rows are padded to the
    /// widest row in the group; `examples` must not be empty.
    pub fn from_examples(examples: &[SquadExample]) -> Self {
        let q_lengths: Vec<usize> = examples.iter().map(|e| e.question_len()).collect();
        let c_lengths: Vec<usize> = examples.iter().map(|e| e.context_len()).collect();

        let q_width = padded_width(examples.iter().map(|e| e.question()), &q_lengths);
        let c_width = padded_width(examples.iter().map(|e| e.context()), &c_lengths);

        let questions = pad_rows(examples.iter().map(|e| e.question()), q_width);
        let passages  = pad_rows(examples.iter().map(|e| e.context()), c_width);
        let labels    = pad_rows(examples.iter().map(|e| e.answer()), c_width);

        // SquadExample::new already checked every invariant these
        // constructors would test, so build the structs directly.
        Self {
            questions: SequenceBatch { token_ids: questions, lengths: q_lengths, max_len: q_width },
            passages:  SequenceBatch { token_ids: passages, lengths: c_lengths, max_len: c_width },
            labels,
        }
    }

    pub fn batch_size(&self) -> usize { self.questions.batch_size() }

    /// Row-major (batch, passage max_len) labels.
    pub fn labels(&self) -> &[u32] { &self.labels }

    /// Cut both sides down to their longest true length.
    pub fn trimmed(&self) -> Self {
        let passages = self.passages.truncated(self.passages.longest());
        let width    = passages.max_len();
        let labels   = (0..self.batch_size())
            .flat_map(|i| {
                let start = i * self.passages.max_len();
                self.labels[start..start + width].iter().copied()
            })
            .collect();
        Self {
            questions: self.questions.truncated(self.questions.longest()),
            passages,
            labels,
        }
    }
}

fn padded_width<'a>(rows: impl Iterator<Item = &'a [u32]>, lengths: &[usize]) -> usize {
    let widest_row = rows.map(|r| r.len()).max().unwrap_or(0);
    let longest    = lengths.iter().copied().max().unwrap_or(0);
    widest_row.max(longest).max(1)
}

fn pad_rows<'a>(rows: impl Iterator<Item = &'a [u32]>, width: usize) -> Vec<u32> {
    let mut out = Vec::new();
    for row in rows {
        out.extend_from_slice(row);
        out.resize(out.len() + (width - row.len()), PAD_ID);
    }
    out
}
