// Device → host copies used by decoding and metrics.
//
// Int tensors are i64 on ndarray and i32 on wgpu, so everything
// is converted before being read back.

use anyhow::{anyhow, Result};
use burn::prelude::*;

pub fn floats<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read float tensor: {e:?}"))
}

pub fn ints<B: Backend, const D: usize>(t: Tensor<B, D, Int>) -> Result<Vec<i64>> {
    t.into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("cannot read int tensor: {e:?}"))
}

pub fn flags<B: Backend, const D: usize>(t: Tensor<B, D, Bool>) -> Result<Vec<bool>> {
    Ok(ints(t.int())?.into_iter().map(|v| v != 0).collect())
}

pub fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}
