// ============================================================
// Layer 3 - Error Taxonomy
// ============================================================
// Every failure the pipeline can raise. Library layers
// (domain, data, ml, infra) return Result<T, QaError>; the
// application and CLI layers wrap these in anyhow::Error.
//
//   Configuration      - bad hyperparameters, fatal at build time
//   DataLoad           - missing / malformed / mis-shaped input
//   OutOfVocabulary    - a token id the embedding table can't serve
//   CheckpointNotFound - restore asked for, nothing on disk
//   Checkpoint         - recorder I/O failed while saving/loading
//
// None of these are retried inside the core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    #[error("unsupported cell type '{0}' (expected 'lstm' or 'gru')")]
    UnsupportedCellType(String),

    #[error("unsupported optimizer '{0}' (expected 'adam' or 'sgd')")]
    UnsupportedOptimizer(String),

    #[error("unsupported model variant '{0}' (expected 'bilstm' or 'baseline')")]
    UnsupportedVariant(String),

    #[error("unsupported layer sharing '{0}' (expected 'independent' or 'shared')")]
    UnsupportedLayerSharing(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to load data from '{origin}': {reason}")]
    DataLoad { origin: String, reason: String },

    #[error("token id {id} is out of vocabulary (vocabulary size {vocab_size})")]
    OutOfVocabulary { id: u32, vocab_size: usize },

    #[error("no checkpoint found under '{0}'")]
    CheckpointNotFound(String),

    #[error("checkpoint I/O failed for '{path}': {reason}")]
    Checkpoint { path: String, reason: String },
}

impl QaError {
    /// Shorthand for the DataLoad variant.
    pub fn data_load(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        QaError::DataLoad { origin: origin.into(), reason: reason.into() }
    }

    /// True for every error raised while building the pipeline from
    /// its configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            QaError::UnsupportedCellType(_)
                | QaError::UnsupportedOptimizer(_)
                | QaError::UnsupportedVariant(_)
                | QaError::UnsupportedLayerSharing(_)
                | QaError::Configuration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_kinds() {
        assert!(QaError::UnsupportedCellType("rnn".into()).is_configuration());
        assert!(QaError::Configuration("hidden_size must be > 0".into()).is_configuration());
        assert!(!QaError::CheckpointNotFound("save".into()).is_configuration());
        assert!(!QaError::data_load("x.npz", "missing").is_configuration());
    }

    #[test]
    fn test_messages_name_the_offender() {
        let e = QaError::OutOfVocabulary { id: 12, vocab_size: 10 };
        assert_eq!(e.to_string(), "token id 12 is out of vocabulary (vocabulary size 10)");

        let e = QaError::UnsupportedCellType("rnn".into());
        assert!(e.to_string().contains("'rnn'"));
    }
}
