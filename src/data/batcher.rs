// ============================================================
// Layer 4 - SQuAD Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<SquadExample>
// into one SquadBatch.
//
// Rows inside a minibatch can have different padded widths;
// every row is right-padded with PAD_ID to the widest one:
//
//   question rows  [4 5 0] [6 7 8 9]  ->  (2, 4)
//   context rows   ...                ->  (2, C)
//   answer rows    follow the context width
//
// The batch stays on the host as token ids. Embedding lookup
// happens inside the pipeline, on its device.
//
// Reference: Burn Book §4 (Batcher)

use burn::data::dataloader::batcher::Batcher;

use crate::domain::{batch::SquadBatch, example::SquadExample};

#[derive(Clone, Debug, Default)]
pub struct SquadBatcher;

impl SquadBatcher {
    pub fn new() -> Self {
        Self
    }
}

// The DataLoader calls .batch(items) with each minibatch of examples.
impl Batcher<SquadExample, SquadBatch> for SquadBatcher {
    fn batch(&self, items: Vec<SquadExample>) -> SquadBatch {
        SquadBatch::from_examples(&items)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_padded_to_widest() {
        let a = SquadExample::new(vec![4, 5, 0], vec![1, 2], vec![0, 1], 2, 2).unwrap();
        let b = SquadExample::new(vec![6, 7, 8, 9], vec![3, 4, 5], vec![1, 0, 0], 4, 3).unwrap();

        let batch = SquadBatcher::new().batch(vec![a, b]);
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.questions.max_len(), 4);
        assert_eq!(batch.questions.row(0), &[4, 5, 0, 0]);
        assert_eq!(batch.passages.row(0), &[1, 2, 0]);
        assert_eq!(batch.passages.lengths(), &[2, 3]);
        assert_eq!(batch.labels(), &[0, 1, 0, 1, 0, 0]);
    }
}
