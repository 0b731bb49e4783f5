// ============================================================
// Layer 5 - Recurrent Cells
// ============================================================
// The two gated cells the encoders can be built from.
//
// LSTM (Hochreiter & Schmidhuber, 1997):
//   i, f, g, o = split(W x + U h + b)
//   c' = σ(f + 1) ⊙ c + σ(i) ⊙ tanh(g)
//   h' = σ(o) ⊙ tanh(c')
//
// GRU (Cho et al., 2014):
//   z, r = σ(W_zr x + U_zr h + b_zr)
//   n    = tanh(W_n x + U_n (r ⊙ h) + b_n)
//   h'   = z ⊙ h + (1 - z) ⊙ n
//
// The input projection W x (+ b) does not depend on the
// recurrent state, so it is applied to the whole sequence in
// one matmul before the time loop. `step` only adds the
// recurrent half.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::{sigmoid, tanh},
};

use crate::domain::options::CellKind;

/// Added to the forget gate pre-activation, as the reference LSTM cell does.
const FORGET_BIAS: f64 = 1.0;

/// Recurrent state of one layer. `cell` is only present for LSTM.
#[derive(Debug, Clone)]
pub struct LayerState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell:   Option<Tensor<B, 2>>,
}

impl<B: Backend> LayerState<B> {
    /// Keep `next` on rows where `mask` is 1 and `self` where it is 0.
    /// `mask` is (batch, hidden) and holds only 0.0 / 1.0.
    pub fn blend(self, next: LayerState<B>, mask: &Tensor<B, 2>) -> LayerState<B> {
        let keep = |old: Tensor<B, 2>, new: Tensor<B, 2>| old.clone() + (new - old) * mask.clone();
        let cell = match (self.cell, next.cell) {
            (Some(old), Some(new)) => Some(keep(old, new)),
            (_, new) => new,
        };
        LayerState { hidden: keep(self.hidden, next.hidden), cell }
    }
}

// ─── LSTM ─────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    /// x -> [i | f | g | o], with bias
    input_gates:  Linear<B>,
    /// h -> [i | f | g | o], no bias
    hidden_gates: Linear<B>,
    hidden_size:  usize,
}

impl<B: Backend> LstmCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            input_gates:  LinearConfig::new(input_size, 4 * hidden_size).init(device),
            hidden_gates: LinearConfig::new(hidden_size, 4 * hidden_size)
                .with_bias(false)
                .init(device),
            hidden_size,
        }
    }

    fn step(&self, projected: Tensor<B, 2>, state: &LayerState<B>) -> LayerState<B> {
        let h = self.hidden_size;
        let gates = projected + self.hidden_gates.forward(state.hidden.clone());

        let input_gate  = sigmoid(gates.clone().narrow(1, 0, h));
        let forget_gate = sigmoid(gates.clone().narrow(1, h, h).add_scalar(FORGET_BIAS));
        let candidate   = tanh(gates.clone().narrow(1, 2 * h, h));
        let output_gate = sigmoid(gates.narrow(1, 3 * h, h));

        let prev_cell = match &state.cell {
            Some(c) => c.clone(),
            None    => state.hidden.zeros_like(),
        };
        let cell   = forget_gate * prev_cell + input_gate * candidate;
        let hidden = output_gate * tanh(cell.clone());

        LayerState { hidden, cell: Some(cell) }
    }
}

// ─── GRU ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    /// x -> [z | r | n], with bias
    input_gates:      Linear<B>,
    /// h -> [z | r], no bias
    hidden_gates:     Linear<B>,
    /// (r ⊙ h) -> n, no bias
    hidden_candidate: Linear<B>,
    hidden_size:      usize,
}

impl<B: Backend> GruCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            input_gates:      LinearConfig::new(input_size, 3 * hidden_size).init(device),
            hidden_gates:     LinearConfig::new(hidden_size, 2 * hidden_size)
                .with_bias(false)
                .init(device),
            hidden_candidate: LinearConfig::new(hidden_size, hidden_size)
                .with_bias(false)
                .init(device),
            hidden_size,
        }
    }

    fn step(&self, projected: Tensor<B, 2>, state: &LayerState<B>) -> LayerState<B> {
        let h = self.hidden_size;
        let prev = state.hidden.clone();

        let zr = sigmoid(
            projected.clone().narrow(1, 0, 2 * h) + self.hidden_gates.forward(prev.clone()),
        );
        let update = zr.clone().narrow(1, 0, h);
        let reset  = zr.narrow(1, h, h);

        let candidate = tanh(
            projected.narrow(1, 2 * h, h) + self.hidden_candidate.forward(reset * prev.clone()),
        );
        // z ⊙ h + (1 - z) ⊙ n, rearranged to n + z ⊙ (h - n)
        let hidden = candidate.clone() + update * (prev - candidate);

        LayerState { hidden, cell: None }
    }
}

// ─── RecurrentCell ────────────────────────────────────────────────────────────
/// One layer of a recurrent stack, of either kind.
#[derive(Module, Debug)]
pub enum RecurrentCell<B: Backend> {
    Lstm(LstmCell<B>),
    Gru(GruCell<B>),
}

impl<B: Backend> RecurrentCell<B> {
    pub fn new(kind: CellKind, input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        match kind {
            CellKind::Lstm => RecurrentCell::Lstm(LstmCell::new(input_size, hidden_size, device)),
            CellKind::Gru  => RecurrentCell::Gru(GruCell::new(input_size, hidden_size, device)),
        }
    }

    pub fn hidden_size(&self) -> usize {
        match self {
            RecurrentCell::Lstm(c) => c.hidden_size,
            RecurrentCell::Gru(c)  => c.hidden_size,
        }
    }

    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> LayerState<B> {
        let zeros = || Tensor::zeros([batch_size, self.hidden_size()], device);
        match self {
            RecurrentCell::Lstm(_) => LayerState { hidden: zeros(), cell: Some(zeros()) },
            RecurrentCell::Gru(_)  => LayerState { hidden: zeros(), cell: None },
        }
    }

    /// W x + b for every time step: (batch, time, input) -> (batch, time, gates).
    pub fn project_inputs(&self, inputs: Tensor<B, 3>) -> Tensor<B, 3> {
        match self {
            RecurrentCell::Lstm(c) => c.input_gates.forward(inputs),
            RecurrentCell::Gru(c)  => c.input_gates.forward(inputs),
        }
    }

    /// Advance one time step given the already projected input.
    pub fn step(&self, projected: Tensor<B, 2>, state: &LayerState<B>) -> LayerState<B> {
        match self {
            RecurrentCell::Lstm(c) => c.step(projected, state),
            RecurrentCell::Gru(c)  => c.step(projected, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn run_step(kind: CellKind) -> (LayerState<TestBackend>, LayerState<TestBackend>) {
        let device = Default::default();
        let cell = RecurrentCell::<TestBackend>::new(kind, 3, 5, &device);
        let x = Tensor::<TestBackend, 3>::ones([2, 1, 3], &device);
        let projected = cell.project_inputs(x).reshape([2, cell_width(kind, 5)]);
        let start = cell.zero_state(2, &device);
        let next = cell.step(projected, &start);
        (start, next)
    }

    fn cell_width(kind: CellKind, hidden: usize) -> usize {
        match kind {
            CellKind::Lstm => 4 * hidden,
            CellKind::Gru  => 3 * hidden,
        }
    }

    #[test]
    fn test_lstm_state_shapes() {
        let (start, next) = run_step(CellKind::Lstm);
        assert!(start.cell.is_some());
        assert_eq!(next.hidden.dims(), [2, 5]);
        assert_eq!(next.cell.unwrap().dims(), [2, 5]);
    }

    #[test]
    fn test_gru_has_no_cell_state() {
        let (start, next) = run_step(CellKind::Gru);
        assert!(start.cell.is_none());
        assert!(next.cell.is_none());
        assert_eq!(next.hidden.dims(), [2, 5]);
    }

    #[test]
    fn test_hidden_values_are_bounded() {
        // Both cells squash their output through tanh
        for kind in [CellKind::Lstm, CellKind::Gru] {
            let (_, next) = run_step(kind);
            let values = next.hidden.into_data().convert::<f32>().to_vec::<f32>().unwrap();
            assert!(values.iter().all(|v| v.abs() <= 1.0));
        }
    }

    #[test]
    fn test_blend_keeps_masked_rows() {
        let device = Default::default();
        let old = LayerState::<TestBackend> {
            hidden: Tensor::zeros([2, 2], &device),
            cell:   None,
        };
        let new = LayerState::<TestBackend> {
            hidden: Tensor::ones([2, 2], &device),
            cell:   None,
        };
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0], [0.0, 0.0]], &device);
        let blended = old.blend(new, &mask);
        let values = blended.hidden.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_hidden_size_follows_constructor() {
        let device = Default::default();
        let cell = RecurrentCell::<TestBackend>::new(CellKind::Gru, 2, 5, &device);
        assert_eq!(cell.hidden_size(), 5);
    }
}
