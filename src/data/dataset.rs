use burn::data::dataset::Dataset;

use crate::domain::example::SquadExample;

/// In-memory SQuAD examples behind Burn's Dataset trait.
pub struct SquadDataset {
    examples: Vec<SquadExample>,
}

impl SquadDataset {
    pub fn new(examples: Vec<SquadExample>) -> Self { Self { examples } }

    pub fn example_count(&self) -> usize { self.examples.len() }

    /// Total passage tokens labelled as answer, for the startup log.
    pub fn answer_token_count(&self) -> usize {
        self.examples.iter().map(SquadExample::answer_token_count).sum()
    }
}

impl Dataset<SquadExample> for SquadDataset {
    fn get(&self, index: usize) -> Option<SquadExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}
