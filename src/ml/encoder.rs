// ============================================================
// Layer 5 - Recurrent Encoders
// ============================================================
// RecurrentStack:  a multi-layer, single-direction recurrent
//                  network unrolled with an explicit
//                  length-aware scan.
// SequenceEncoder: a forward stack plus an optional backward
//                  stack (bidirectional mode).
//
// Length-aware scan, per time step t:
//
//   mask[b] = 1 if t < lengths[b] else 0
//   state   = state + (cell(x_t, state) - state) * mask
//   out_t   = state.hidden * mask
//
// Once an example runs past its true length its state is
// carried forward untouched, so the final state is the state
// at the true last token no matter how much padding follows.
// Outputs at padded positions are zero.
//
// Backward direction: each example is reversed over its own
// true length only (padding stays where it is), encoded with
// the backward stack, then reversed back so time steps line
// up with the forward outputs.

use burn::prelude::*;

use crate::domain::{
    errors::QaError,
    options::{CellKind, LayerSharing},
};
use crate::ml::{
    cell::{LayerState, RecurrentCell},
    tensors::{float_tensor, int_tensor},
};

/// Final per-layer state of one stack.
#[derive(Debug, Clone)]
pub struct StackState<B: Backend> {
    pub layers: Vec<LayerState<B>>,
}

/// Final state of an encoder: one stack state per direction.
#[derive(Debug, Clone)]
pub struct EncoderState<B: Backend> {
    pub forward:  StackState<B>,
    pub backward: Option<StackState<B>>,
}

// ─── RecurrentStack ───────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct RecurrentStackConfig {
    pub cell_kind:   CellKind,
    pub input_size:  usize,
    pub hidden_size: usize,
    #[config(default = 1)]
    pub num_layers:  usize,
    #[config(default = "LayerSharing::Independent")]
    pub layer_sharing: LayerSharing,
}

impl RecurrentStackConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<RecurrentStack<B>, QaError> {
        if self.input_size == 0 || self.hidden_size == 0 || self.num_layers == 0 {
            return Err(QaError::Configuration(format!(
                "recurrent stack needs positive sizes (input {}, hidden {}, layers {})",
                self.input_size, self.hidden_size, self.num_layers
            )));
        }

        let cells = match self.layer_sharing {
            LayerSharing::Independent => (0..self.num_layers)
                .map(|layer| {
                    let input = if layer == 0 { self.input_size } else { self.hidden_size };
                    RecurrentCell::new(self.cell_kind, input, self.hidden_size, device)
                })
                .collect(),
            LayerSharing::Shared => {
                // One cell serves every layer, so upper layers feed it
                // hidden_size inputs while layer 0 feeds input_size.
                if self.num_layers > 1 && self.input_size != self.hidden_size {
                    return Err(QaError::Configuration(format!(
                        "shared layers need input size == hidden size, got {} and {}",
                        self.input_size, self.hidden_size
                    )));
                }
                vec![RecurrentCell::new(self.cell_kind, self.input_size, self.hidden_size, device)]
            }
        };

        Ok(RecurrentStack {
            cells,
            num_layers:  self.num_layers,
            hidden_size: self.hidden_size,
        })
    }
}

#[derive(Module, Debug)]
pub struct RecurrentStack<B: Backend> {
    /// One cell per layer, or a single cell reused by every layer.
    cells:       Vec<RecurrentCell<B>>,
    num_layers:  usize,
    hidden_size: usize,
}

impl<B: Backend> RecurrentStack<B> {
    pub fn hidden_size(&self) -> usize { self.hidden_size }

    pub fn num_layers(&self) -> usize { self.num_layers }

    pub fn is_shared(&self) -> bool { self.cells.len() < self.num_layers }

    fn cell(&self, layer: usize) -> &RecurrentCell<B> {
        &self.cells[layer.min(self.cells.len() - 1)]
    }

    /// Zero state for every layer.
    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> StackState<B> {
        StackState {
            layers: (0..self.num_layers)
                .map(|layer| self.cell(layer).zero_state(batch_size, device))
                .collect(),
        }
    }

    /// Run the stack over `inputs` (batch, time, input_size).
    ///
    /// Returns outputs (batch, time, hidden_size) of the top layer and
    /// the final state of every layer, taken at each example's true
    /// length. `initial` replaces the zero start state of every layer.
    ///
    /// # Panics
    /// If `initial` does not hold exactly one state per layer.
    pub fn encode(
        &self,
        inputs:  Tensor<B, 3>,
        lengths: &[usize],
        initial: Option<StackState<B>>,
    ) -> (Tensor<B, 3>, StackState<B>) {
        let [batch, time, _] = inputs.dims();
        let device = inputs.device();

        let start = match initial {
            Some(state) => state.layers,
            None        => self.zero_state(batch, &device).layers,
        };
        assert_eq!(
            start.len(),
            self.num_layers,
            "initial state has {} layers, stack has {}",
            start.len(),
            self.num_layers
        );
        let masks = step_masks::<B>(lengths, time, self.hidden_size, &device);

        let mut layer_input = inputs;
        let mut finals = Vec::with_capacity(self.num_layers);

        for (layer, mut state) in start.into_iter().enumerate() {
            let cell = self.cell(layer);
            let projected = cell.project_inputs(layer_input);
            let width = projected.dims()[2];

            let mut outputs = Vec::with_capacity(time);

            for (t, mask) in masks.iter().enumerate() {
                let x_t = projected
                    .clone()
                    .slice([0..batch, t..t + 1, 0..width])
                    .reshape([batch, width]);
                let next = cell.step(x_t, &state);
                state = state.blend(next, mask);
                outputs.push(state.hidden.clone() * mask.clone());
            }

            layer_input = Tensor::stack::<3>(outputs, 1);
            finals.push(state);
        }

        (layer_input, StackState { layers: finals })
    }
}

// ─── SequenceEncoder ──────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct SequenceEncoderConfig {
    pub stack: RecurrentStackConfig,
    #[config(default = false)]
    pub bidirectional: bool,
}

impl SequenceEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SequenceEncoder<B>, QaError> {
        let forward_stack = self.stack.init(device)?;
        let backward_stack = if self.bidirectional {
            Some(self.stack.init(device)?)
        } else {
            None
        };
        Ok(SequenceEncoder { forward_stack, backward_stack })
    }
}

#[derive(Module, Debug)]
pub struct SequenceEncoder<B: Backend> {
    forward_stack:  RecurrentStack<B>,
    backward_stack: Option<RecurrentStack<B>>,
}

impl<B: Backend> SequenceEncoder<B> {
    pub fn is_bidirectional(&self) -> bool {
        self.backward_stack.is_some()
    }

    /// Feature width of the encoder outputs.
    pub fn output_size(&self) -> usize {
        let h = self.forward_stack.hidden_size();
        if self.is_bidirectional() { 2 * h } else { h }
    }

    /// Encode a padded batch.
    ///
    /// Bidirectional encoders concatenate forward and backward outputs
    /// on the feature axis. A missing backward seed starts that
    /// direction from zeros.
    pub fn encode(
        &self,
        inputs:  Tensor<B, 3>,
        lengths: &[usize],
        initial: Option<EncoderState<B>>,
    ) -> (Tensor<B, 3>, EncoderState<B>) {
        let (initial_fw, initial_bw) = match initial {
            Some(state) => (Some(state.forward), state.backward),
            None        => (None, None),
        };

        let Some(backward_stack) = &self.backward_stack else {
            let (outputs, forward) = self.forward_stack.encode(inputs, lengths, initial_fw);
            return (outputs, EncoderState { forward, backward: None });
        };

        let reversed = reverse_padded(inputs.clone(), lengths);
        let (fw_outputs, forward)  = self.forward_stack.encode(inputs, lengths, initial_fw);
        let (bw_outputs, backward) = backward_stack.encode(reversed, lengths, initial_bw);
        let bw_outputs = reverse_padded(bw_outputs, lengths);

        (
            Tensor::cat(vec![fw_outputs, bw_outputs], 2),
            EncoderState { forward, backward: Some(backward) },
        )
    }
}

/// Reverse every example over its own true length, leaving padding in place.
///
///   [a b c 0 0] with length 3  ->  [c b a 0 0]
pub fn reverse_padded<B: Backend>(inputs: Tensor<B, 3>, lengths: &[usize]) -> Tensor<B, 3> {
    let [batch, time, width] = inputs.dims();
    let mut indices = Vec::with_capacity(batch * time * width);
    for &len in lengths {
        let len = len.min(time);
        for t in 0..time {
            let source = if t < len { len - 1 - t } else { t };
            indices.extend(std::iter::repeat(source as i64).take(width));
        }
    }
    let indices = int_tensor::<B, 3>(indices, [batch, time, width], &inputs.device());
    inputs.gather(1, indices)
}

/// One (batch, hidden) 0/1 mask per time step.
fn step_masks<B: Backend>(
    lengths: &[usize],
    time:    usize,
    hidden:  usize,
    device:  &B::Device,
) -> Vec<Tensor<B, 2>> {
    (0..time)
        .map(|t| {
            let values = lengths
                .iter()
                .flat_map(|&len| {
                    let v = if t < len { 1.0 } else { 0.0 };
                    std::iter::repeat(v).take(hidden)
                })
                .collect();
            float_tensor(values, [lengths.len(), hidden], device)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{x} != {y}");
        }
    }

    /// Two sequences of true lengths 3 and 5 padded to `time`; padding
    /// positions hold large junk values so any leak would show.
    fn padded_inputs(time: usize, device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 3> {
        let lengths = [3, 5];
        let mut values = Vec::new();
        for (b, &len) in lengths.iter().enumerate() {
            for t in 0..time {
                for d in 0..4 {
                    let v = if t < len {
                        ((b * 31 + t * 7 + d) % 11) as f32 / 11.0 - 0.5
                    } else {
                        100.0 + (t * d) as f32
                    };
                    values.push(v);
                }
            }
        }
        float_tensor(values, [2, time, 4], device)
    }

    fn stack(kind: CellKind, layers: usize) -> RecurrentStack<TestBackend> {
        RecurrentStackConfig::new(kind, 4, 6)
            .with_num_layers(layers)
            .init(&Default::default())
            .unwrap()
    }

    #[test]
    fn test_output_time_dim_matches_input() {
        let device = Default::default();
        let s = stack(CellKind::Gru, 2);
        let (outputs, state) = s.encode(padded_inputs(10, &device), &[3, 5], None);
        assert_eq!(outputs.dims(), [2, 10, 6]);
        assert_eq!(state.layers.len(), 2);
    }

    #[test]
    fn test_final_state_ignores_padding_length() {
        let device = Default::default();
        for kind in [CellKind::Lstm, CellKind::Gru] {
            let s = stack(kind, 2);
            let (_, short) = s.encode(padded_inputs(10, &device), &[3, 5], None);
            let (_, long)  = s.encode(padded_inputs(20, &device), &[3, 5], None);
            for (a, b) in short.layers.into_iter().zip(long.layers) {
                assert_close(&to_vec(a.hidden), &to_vec(b.hidden));
                if let (Some(ca), Some(cb)) = (a.cell, b.cell) {
                    assert_close(&to_vec(ca), &to_vec(cb));
                }
            }
        }
    }

    #[test]
    fn test_outputs_past_length_are_zero() {
        let device = Default::default();
        let s = stack(CellKind::Lstm, 1);
        let (outputs, _) = s.encode(padded_inputs(6, &device), &[3, 5], None);
        let values = to_vec(outputs);
        // example 0, steps 3..6
        let tail = &values[3 * 6..6 * 6];
        assert!(tail.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_initial_state_changes_outputs() {
        let device = Default::default();
        let s = stack(CellKind::Gru, 1);
        let inputs = padded_inputs(5, &device);
        let (plain, _) = s.encode(inputs.clone(), &[3, 5], None);
        let seed = StackState {
            layers: vec![LayerState { hidden: Tensor::ones([2, 6], &device), cell: None }],
        };
        let (seeded, _) = s.encode(inputs, &[3, 5], Some(seed));
        assert_ne!(to_vec(plain), to_vec(seeded));
    }

    #[test]
    fn test_zero_length_keeps_initial_state() {
        let device = Default::default();
        let s = stack(CellKind::Gru, 1);
        let seed = StackState {
            layers: vec![LayerState { hidden: Tensor::ones([2, 6], &device) * 0.5, cell: None }],
        };
        let (_, state) = s.encode(padded_inputs(4, &device), &[0, 4], Some(seed));
        let hidden = to_vec(state.layers[0].hidden.clone());
        assert!(hidden[..6].iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_reverse_padded_is_length_aware() {
        let device = Default::default();
        let x = float_tensor::<TestBackend, 3>(
            vec![1.0, 2.0, 3.0, 0.0, 0.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            [2, 5, 1],
            &device,
        );
        let r = reverse_padded(x.clone(), &[3, 5]);
        assert_eq!(to_vec(r.clone()), vec![3.0, 2.0, 1.0, 0.0, 0.0, 8.0, 7.0, 6.0, 5.0, 4.0]);
        // Reversing twice gives the input back
        assert_eq!(to_vec(reverse_padded(r, &[3, 5])), to_vec(x));
    }

    #[test]
    fn test_bidirectional_matches_forward_on_reversed_input() {
        let device = Default::default();
        let lengths = [3, 5];
        let encoder = SequenceEncoderConfig::new(RecurrentStackConfig::new(CellKind::Lstm, 4, 6))
            .with_bidirectional(true)
            .init::<TestBackend>(&device)
            .unwrap();
        assert_eq!(encoder.output_size(), 12);

        let inputs = padded_inputs(7, &device);
        let (outputs, state) = encoder.encode(inputs.clone(), &lengths, None);
        assert_eq!(outputs.dims(), [2, 7, 12]);
        assert!(state.backward.is_some());

        // The backward half equals running the backward stack forward over
        // the reversed input, then reversing its outputs back.
        let backward_stack = encoder.backward_stack.as_ref().unwrap();
        let (expected, _) = backward_stack.encode(reverse_padded(inputs, &lengths), &lengths, None);
        let expected = reverse_padded(expected, &lengths);
        let backward_half = outputs.slice([0..2, 0..7, 6..12]);
        assert_close(&to_vec(backward_half), &to_vec(expected));
    }

    #[test]
    fn test_backward_seed_reaches_backward_half_only() {
        let device = Default::default();
        let lengths = [3, 5];
        let encoder = SequenceEncoderConfig::new(RecurrentStackConfig::new(CellKind::Lstm, 4, 6))
            .with_bidirectional(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let inputs = padded_inputs(7, &device);
        let (plain, _) = encoder.encode(inputs.clone(), &lengths, None);

        let seed = EncoderState {
            forward: encoder.forward_stack.zero_state(2, &device),
            backward: Some(StackState {
                layers: vec![LayerState {
                    hidden: Tensor::ones([2, 6], &device) * 0.5,
                    cell:   Some(Tensor::ones([2, 6], &device) * -0.5),
                }],
            }),
        };
        let (seeded, _) = encoder.encode(inputs, &lengths, Some(seed));

        assert_close(
            &to_vec(plain.clone().slice([0..2, 0..7, 0..6])),
            &to_vec(seeded.clone().slice([0..2, 0..7, 0..6])),
        );
        assert_ne!(
            to_vec(plain.slice([0..2, 0..7, 6..12])),
            to_vec(seeded.slice([0..2, 0..7, 6..12])),
        );
    }

    #[test]
    #[should_panic(expected = "initial state has 1 layers, stack has 2")]
    fn test_initial_state_with_missing_layer_panics() {
        let device = Default::default();
        let s = stack(CellKind::Gru, 2);
        let seed = StackState {
            layers: vec![LayerState { hidden: Tensor::zeros([2, 6], &device), cell: None }],
        };
        s.encode(padded_inputs(4, &device), &[3, 4], Some(seed));
    }

    #[test]
    fn test_unidirectional_encoder_width() {
        let encoder = SequenceEncoderConfig::new(RecurrentStackConfig::new(CellKind::Gru, 4, 6))
            .init::<TestBackend>(&Default::default())
            .unwrap();
        assert!(!encoder.is_bidirectional());
        assert_eq!(encoder.output_size(), 6);
    }

    #[test]
    fn test_shared_layers_need_matching_sizes() {
        let device = Default::default();
        let err = RecurrentStackConfig::new(CellKind::Gru, 4, 6)
            .with_num_layers(2)
            .with_layer_sharing(LayerSharing::Shared)
            .init::<TestBackend>(&device)
            .unwrap_err();
        assert!(err.is_configuration());

        let shared = RecurrentStackConfig::new(CellKind::Gru, 6, 6)
            .with_num_layers(3)
            .with_layer_sharing(LayerSharing::Shared)
            .init::<TestBackend>(&device)
            .unwrap();
        assert!(shared.is_shared());
        assert_eq!(shared.num_layers(), 3);
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        let err = RecurrentStackConfig::new(CellKind::Lstm, 4, 0)
            .init::<TestBackend>(&Default::default())
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
