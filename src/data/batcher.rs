// ============================================================
// Layer 4 — Digit Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<DigitSample>
// into tensors for one forward pass.
//
// How batching works here:
//   Input:  N samples, each 28x28x1 floats + a one-hot target
//   Output: DigitBatch with
//             images  [N, 1, 28, 28]
//             targets [N, 10]
//             labels  [N]
//
// Burn convolutions are channels-first (NCHW) while our
// samples carry the channel last (HWC). With a single channel
// both layouts have the same memory order, so flattening the
// samples and reshaping is enough — no transpose needed.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::DigitSample;
use crate::domain::image::{CHANNELS, HEIGHT, NUM_CLASSES, WIDTH};

// ─── DigitBatch ───────────────────────────────────────────────────────────────
/// A batch of samples ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct DigitBatch<B: Backend> {
    /// Pixel values — shape: [batch_size, 1, 28, 28]
    pub images: Tensor<B, 4>,

    /// One-hot targets — shape: [batch_size, 10]
    pub targets: Tensor<B, 2>,

    /// Integer class of each sample — shape: [batch_size]
    /// Used for accuracy, the loss works on `targets`
    pub labels: Tensor<B, 1, Int>,
}

// ─── DigitBatcher ─────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the right CPU/GPU.
#[derive(Clone, Debug)]
pub struct DigitBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> DigitBatcher<B> {
    /// Create a new batcher for the given device
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<DigitSample, DigitBatch<B>> for DigitBatcher<B> {
    fn batch(&self, items: Vec<DigitSample>) -> DigitBatch<B> {
        let batch_size = items.len();

        // ── Flatten pixels ────────────────────────────────────────────────────
        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|s| s.image.values().iter().copied())
            .collect();

        // ── Flatten one-hot targets ───────────────────────────────────────────
        let targets: Vec<f32> = items
            .iter()
            .flat_map(|s| s.target.as_slice().iter().copied())
            .collect();

        let labels: Vec<i64> = items
            .iter()
            .map(|s| s.label.value() as i64)
            .collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, CHANNELS, HEIGHT, WIDTH])
                .convert::<B::FloatElem>(),
            &self.device,
        );

        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(targets, [batch_size, NUM_CLASSES]).convert::<B::FloatElem>(),
            &self.device,
        );

        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]).convert::<B::IntElem>(),
            &self.device,
        );

        DigitBatch { images, targets, labels }
    }
}
