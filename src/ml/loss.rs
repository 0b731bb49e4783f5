// ============================================================
// Layer 5 - Per-token Loss
// ============================================================
// Sparse categorical cross-entropy between the classifier's
// 2-class logits and the 0/1 answer label of every passage
// token:
//
//   loss = mean over tokens of  -log softmax(logits)[label]
//
// Two averaging modes:
//   masked   - mean over real passage tokens only (default)
//   unmasked - mean over every padded position

use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::ml::tensors::length_mask;

/// logits (batch, time, classes), labels (batch, time) -> scalar loss [1].
pub fn token_cross_entropy<B: Backend>(
    logits:  Tensor<B, 3>,
    labels:  Tensor<B, 2, Int>,
    lengths: Option<&[usize]>,
) -> Tensor<B, 1> {
    let [batch, time, classes] = logits.dims();

    let Some(lengths) = lengths else {
        let ce = CrossEntropyLossConfig::new().init(&logits.device());
        return ce.forward(
            logits.reshape([batch * time, classes]),
            labels.reshape([batch * time]),
        );
    };

    let mask = length_mask::<B>(lengths, time, &logits.device());
    let log_probs = log_softmax(logits, 2);
    let picked = log_probs
        .gather(2, labels.unsqueeze_dim::<3>(2))
        .reshape([batch, time]);

    let tokens = mask.clone().sum().clamp_min(1.0);
    (picked.neg() * mask).sum() / tokens
}
