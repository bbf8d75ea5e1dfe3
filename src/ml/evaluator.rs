// ============================================================
// Layer 5 — Evaluator
// ============================================================
// One pass over a labelled split: mean categorical
// cross-entropy and accuracy. Reads the model, never
// changes it. Used for the held-out test split and, by the
// trainer, for the validation subset after every epoch.
//
// Loss and accuracy are weighted by batch size so a short
// final batch does not skew the averages.

use anyhow::{anyhow, Context, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    prelude::*,
};

use crate::data::{
    batcher::{DigitBatch, DigitBatcher},
    dataset::{DigitDataset, DigitSample},
};
use crate::domain::image::{NormalizedImage, Prediction, CHANNELS, HEIGHT, WIDTH};
use crate::ml::model::{categorical_cross_entropy, DigitClassifier};

/// Aggregate metrics over a split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss:     f64,
    pub accuracy: f64,
    /// Number of samples seen
    pub count:    usize,
}

/// Number of rows whose argmax equals the label.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns shape [batch, 1] — flatten to [batch]
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

/// Evaluate over already-built batches. `None` when there were no samples.
pub fn evaluate_batches<B, I>(model: &DigitClassifier<B>, batches: I) -> Option<Evaluation>
where
    B: Backend,
    I: IntoIterator<Item = DigitBatch<B>>,
{
    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;
    let mut count    = 0usize;

    for batch in batches {
        let n = batch.labels.dims()[0];
        let logits = model.forward(batch.images);

        let loss = categorical_cross_entropy(logits.clone(), batch.targets)
            .into_scalar()
            .elem::<f64>();

        loss_sum += loss * n as f64;
        correct  += count_correct(logits, batch.labels);
        count    += n;
    }

    (count > 0).then(|| Evaluation {
        loss:     loss_sum / count as f64,
        accuracy: correct as f64 / count as f64,
        count,
    })
}

/// Evaluate a whole split in one pass (no partitioning).
pub fn evaluate<B: Backend>(
    model:      &DigitClassifier<B>,
    samples:    Vec<DigitSample>,
    batch_size: usize,
    device:     &B::Device,
) -> Result<Evaluation> {
    let total = samples.len();
    let loader = DataLoaderBuilder::new(DigitBatcher::<B>::new(device.clone()))
        .batch_size(batch_size)
        .build(DigitDataset::new(samples));

    let evaluation = evaluate_batches(model, loader.iter())
        .context("Cannot evaluate an empty split")?;

    tracing::debug!(
        "Evaluated {} / {} samples: loss={:.4} accuracy={:.4}",
        evaluation.count,
        total,
        evaluation.loss,
        evaluation.accuracy
    );
    Ok(evaluation)
}

/// Per-image predictions from one forward pass over `images`.
pub fn predict_batch<B: Backend>(
    model:  &DigitClassifier<B>,
    images: &[NormalizedImage],
    device: &B::Device,
) -> Result<Vec<Prediction>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let flat: Vec<f32> = images
        .iter()
        .flat_map(|img| img.values().iter().copied())
        .collect();
    // single channel: HWC and CHW share the same memory order
    let input = Tensor::<B, 4>::from_data(
        TensorData::new(flat, [images.len(), CHANNELS, HEIGHT, WIDTH]).convert::<B::FloatElem>(),
        device,
    );

    let probs = model
        .forward_probs(input)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read model output: {e:?}"))?;

    probs
        .chunks(probs.len() / images.len())
        .map(|row| Prediction::from_probabilities(row.to_vec()))
        .collect()
}
