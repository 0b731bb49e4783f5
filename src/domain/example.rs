// ============================================================
// Layer 3 - SquadExample Domain Type
// ============================================================
// One SQuAD training example after preprocessing:
//   - a padded row of question token ids
//   - a padded row of passage (context) token ids
//   - a 0/1 label per passage token (1 = inside the answer)
//   - the true, unpadded length of question and passage
//
// Example:
//   Context: "the ceremony is on 15 april"   (ids padded to 8)
//   Answer:  [0, 0, 0, 0, 1, 1, 0, 0]
//
// Fields are private so that every SquadExample in the
// system has passed the checks in `new`; downstream batching
// relies on that and never re-validates.

use serde::{Deserialize, Serialize};

use crate::domain::errors::QaError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadExample {
    question:     Vec<u32>,
    context:      Vec<u32>,
    answer:       Vec<u32>,
    question_len: usize,
    context_len:  usize,
}

impl SquadExample {
    /// Build a validated example.
    ///
    /// Fails with DataLoad when a length exceeds its padded row,
    /// when the answer row is not aligned with the context row,
    /// or when a label is anything other than 0 or 1.
    pub fn new(
        question:     Vec<u32>,
        context:      Vec<u32>,
        answer:       Vec<u32>,
        question_len: usize,
        context_len:  usize,
    ) -> Result<Self, QaError> {
        if question_len > question.len() {
            return Err(QaError::data_load(
                "example",
                format!("question length {question_len} exceeds padded width {}", question.len()),
            ));
        }
        if context_len > context.len() {
            return Err(QaError::data_load(
                "example",
                format!("context length {context_len} exceeds padded width {}", context.len()),
            ));
        }
        if answer.len() != context.len() {
            return Err(QaError::data_load(
                "example",
                format!("answer row has {} labels for {} context tokens", answer.len(), context.len()),
            ));
        }
        if let Some(bad) = answer.iter().find(|&&a| a > 1) {
            return Err(QaError::data_load("example", format!("answer label {bad} is not 0 or 1")));
        }

        Ok(Self { question, context, answer, question_len, context_len })
    }

    pub fn question(&self) -> &[u32] { &self.question }

    pub fn context(&self) -> &[u32] { &self.context }

    pub fn answer(&self) -> &[u32] { &self.answer }

    pub fn question_len(&self) -> usize { self.question_len }

    pub fn context_len(&self) -> usize { self.context_len }

    /// Number of passage tokens labelled as answer, padding excluded.
    pub fn answer_token_count(&self) -> usize {
        self.answer[..self.context_len].iter().filter(|&&a| a == 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_example() {
        let ex = SquadExample::new(vec![4, 5, 0], vec![7, 8, 9, 0], vec![0, 1, 1, 0], 2, 3).unwrap();
        assert_eq!(ex.question_len(), 2);
        assert_eq!(ex.answer_token_count(), 2);
    }

    #[test]
    fn test_length_beyond_padding_is_rejected() {
        let err = SquadExample::new(vec![4, 5], vec![7], vec![0], 3, 1).unwrap_err();
        assert!(matches!(err, QaError::DataLoad { .. }));
    }

    #[test]
    fn test_misaligned_answer_is_rejected() {
        assert!(SquadExample::new(vec![4], vec![7, 8], vec![0], 1, 2).is_err());
    }

    #[test]
    fn test_non_binary_label_is_rejected() {
        assert!(SquadExample::new(vec![4], vec![7, 8], vec![0, 2], 1, 2).is_err());
    }

    #[test]
    fn test_answer_count_ignores_padding() {
        // The trailing 1 sits past context_len and must not count
        let ex = SquadExample::new(vec![1], vec![3, 3, 3], vec![1, 0, 1], 1, 2).unwrap();
        assert_eq!(ex.answer_token_count(), 1);
    }
}
