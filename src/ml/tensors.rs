// ============================================================
// Layer 5 - Host <-> Tensor Conversions
// ============================================================
// Small helpers that move host-side batch data onto a Burn
// device. Data is converted to the backend's own element type
// first, so the same call works on Wgpu (i32 ints) and NdArray
// (i64 ints).

use burn::{prelude::*, tensor::TensorData};

use crate::domain::batch::{SequenceBatch, SquadBatch};

pub fn float_tensor<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape:  [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(values, shape).convert::<B::FloatElem>(), device)
}

pub fn int_tensor<B: Backend, const D: usize>(
    values: Vec<i64>,
    shape:  [usize; D],
    device: &B::Device,
) -> Tensor<B, D, Int> {
    Tensor::from_data(TensorData::new(values, shape).convert::<B::IntElem>(), device)
}

/// Token ids as a (batch, max_len) int tensor.
pub fn token_ids<B: Backend>(batch: &SequenceBatch, device: &B::Device) -> Tensor<B, 2, Int> {
    let values = batch.token_ids().iter().map(|&id| id as i64).collect();
    int_tensor(values, [batch.batch_size(), batch.max_len()], device)
}

/// Answer labels as a (batch, passage max_len) int tensor.
pub fn labels<B: Backend>(batch: &SquadBatch, device: &B::Device) -> Tensor<B, 2, Int> {
    let values = batch.labels().iter().map(|&l| l as i64).collect();
    int_tensor(values, [batch.batch_size(), batch.passages.max_len()], device)
}

/// (batch, time) float mask, 1.0 on real tokens and 0.0 on padding.
pub fn length_mask<B: Backend>(lengths: &[usize], time: usize, device: &B::Device) -> Tensor<B, 2> {
    let values = lengths
        .iter()
        .flat_map(|&len| (0..time).map(move |t| if t < len { 1.0 } else { 0.0 }))
        .collect();
    float_tensor(values, [lengths.len(), time], device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_length_mask_layout() {
        let device = Default::default();
        let mask = length_mask::<TestBackend>(&[2, 0, 3], 3, &device);
        assert_eq!(mask.dims(), [3, 3]);
        let values = mask.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_token_ids_shape() {
        let device = Default::default();
        let batch = SequenceBatch::new(vec![3, 4, 0, 9, 8, 7], vec![2, 3], 3).unwrap();
        let ids = token_ids::<TestBackend>(&batch, &device);
        assert_eq!(ids.dims(), [2, 3]);
        let values = ids.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(values, vec![3, 4, 0, 9, 8, 7]);
    }
}
