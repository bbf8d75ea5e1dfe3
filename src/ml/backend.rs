// Backend selection. CPU ndarray by default, wgpu behind the `wgpu` feature.

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray<f32>;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

pub type Device = <InferBackend as burn::tensor::backend::Backend>::Device;

pub fn default_device() -> Device {
    Device::default()
}
