// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// The model code is generic over the Burn backend. The concrete
// backend is picked once, at the top of each use case:
//
//   --device cpu   → Autodiff<NdArray>   (default, runs anywhere)
//   --device wgpu  → Autodiff<Wgpu>      (GPU through WebGPU)
//
// Training uses B; evaluation and prediction use B::InnerBackend
// (same device, no autodiff graph).
//
// Generic functions cannot be passed as closures, so work that
// needs a backend implements BackendTask and gets monomorphised
// for whichever backend dispatch() selects.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Wgpu,
}

pub trait BackendTask {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<Self::Output>;
}

pub fn dispatch<T: BackendTask>(kind: DeviceKind, task: T) -> Result<T::Output> {
    match kind {
        DeviceKind::Cpu => {
            let device = NdArrayDevice::Cpu;
            tracing::info!("Using NdArray device: {:?}", device);
            task.run::<Autodiff<NdArray>>(device)
        }
        DeviceKind::Wgpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            task.run::<Autodiff<Wgpu>>(device)
        }
    }
}
