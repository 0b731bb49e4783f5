use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::domain::{
    errors::QaError,
    options::{CellKind, LayerSharing, ModelVariant},
};
use crate::ml::encoder::{
    RecurrentStack, RecurrentStackConfig, SequenceEncoder, SequenceEncoderConfig,
};

/// Classes per passage token: not-in-answer (0) and in-answer (1).
pub const NUM_CLASSES: usize = 2;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct SquadModelConfig {
    pub variant:     ModelVariant,
    pub cell_kind:   CellKind,
    pub embed_dim:   usize,
    pub hidden_size: usize,
    pub layers:      usize,
    #[config(default = "LayerSharing::Independent")]
    pub layer_sharing: LayerSharing,
    /// Put a 2 -> 2 linear layer on top of the classifier outputs.
    #[config(default = false)]
    pub project_logits: bool,
}

impl SquadModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SquadModel<B>, QaError> {
        let bidirectional = self.variant.bidirectional();

        let encoder_stack = |input_size: usize| {
            RecurrentStackConfig::new(self.cell_kind, input_size, self.hidden_size)
                .with_num_layers(self.layers)
                .with_layer_sharing(self.layer_sharing)
        };

        // The passage encoder is seeded with the question's final state,
        // so both are built from the same stack shape.
        let question_encoder = SequenceEncoderConfig::new(encoder_stack(self.embed_dim))
            .with_bidirectional(bidirectional)
            .init(device)?;
        let passage_encoder = SequenceEncoderConfig::new(encoder_stack(self.embed_dim))
            .with_bidirectional(bidirectional)
            .init(device)?;

        // The classifier is always an LSTM whose hidden width is the class count.
        let classifier = RecurrentStackConfig::new(
            CellKind::Lstm,
            passage_encoder.output_size(),
            NUM_CLASSES,
        )
        .with_num_layers(self.variant.classifier_layers())
        .init(device)?;

        let output_projection = self
            .project_logits
            .then(|| LinearConfig::new(NUM_CLASSES, NUM_CLASSES).init(device));

        Ok(SquadModel { question_encoder, passage_encoder, classifier, output_projection })
    }
}

#[derive(Module, Debug)]
pub struct SquadModel<B: Backend> {
    pub question_encoder:  SequenceEncoder<B>,
    pub passage_encoder:   SequenceEncoder<B>,
    pub classifier:        RecurrentStack<B>,
    pub output_projection: Option<Linear<B>>,
}

impl<B: Backend> SquadModel<B> {
    /// question (batch, q_time, embed), passage (batch, p_time, embed)
    /// -> per-token logits (batch, p_time, NUM_CLASSES)
    pub fn forward(
        &self,
        question:         Tensor<B, 3>,
        question_lengths: &[usize],
        passage:          Tensor<B, 3>,
        passage_lengths:  &[usize],
    ) -> Tensor<B, 3> {
        // Only the question's final state is used: it is the question "summary"
        let (_, question_state) = self.question_encoder.encode(question, question_lengths, None);

        let (passage_repr, _) =
            self.passage_encoder.encode(passage, passage_lengths, Some(question_state));

        let (logits, _) = self.classifier.encode(passage_repr, passage_lengths, None);

        match &self.output_projection {
            Some(projection) => projection.forward(logits),
            None             => logits,
        }
    }
}
