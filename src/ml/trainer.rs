// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
//   1. Seed the backend (parameter init) from TrainConfig
//   2. Hold out the validation tail (80/20 by default)
//   3. Each epoch: shuffled mini-batches → categorical
//      cross-entropy → backward → Adam step
//   4. After each epoch: evaluate the validation subset on
//      the inner (non-autodiff) backend
//
// Training uses B (an AutodiffBackend) for gradients;
// model.valid() returns the same model on B::InnerBackend,
// so the validation batcher must use B::InnerBackend too.
//
// Divergence is not recovered from: a non-finite loss is
// only reported.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use std::time::Instant;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::config::TrainConfig;
use crate::data::{
    batcher::DigitBatcher,
    dataset::{DigitDataset, DigitSample},
    splitter::split_train_val,
};
use crate::infra::metrics::{EpochMetrics, History};
use crate::ml::evaluator::{count_correct, evaluate_batches};
use crate::ml::model::{DigitClassifier, ModelConfig};

/// Fit a fresh model to `samples`. Returns the trained model and the
/// per-epoch history of both subsets.
pub fn run_training<B: AutodiffBackend>(
    model_cfg: &ModelConfig,
    cfg:       &TrainConfig,
    samples:   Vec<DigitSample>,
    device:    &B::Device,
) -> Result<(DigitClassifier<B>, History)> {
    ensure!(cfg.batch_size > 0, "batch size must be > 0");
    ensure!(
        (0.0..1.0).contains(&cfg.validation_split),
        "validation split must be in [0, 1), got {}",
        cfg.validation_split
    );

    B::seed(cfg.seed);

    // ── Train / validation split ──────────────────────────────────────────────
    let shuffle_seed = cfg.shuffle_split.then_some(cfg.seed);
    let (train_samples, val_samples) = split_train_val(samples, cfg.validation_split, shuffle_seed);
    ensure!(!train_samples.is_empty(), "no training samples left after the validation split");
    tracing::info!(
        "Training on {} samples, validating on {}",
        train_samples.len(),
        val_samples.len()
    );

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: DigitClassifier<B> = model_cfg.build(device)?;
    tracing::info!("Model ready: {} parameters", model.num_params());

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(1e-7).init();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader = DataLoaderBuilder::new(DigitBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(DigitDataset::new(train_samples));

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let has_validation = !val_samples.is_empty();
    let val_loader = DataLoaderBuilder::new(DigitBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(DigitDataset::new(val_samples));

    let mut history = History::default();
    let started = Instant::now();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;
        let mut correct  = 0usize;
        let mut seen     = 0usize;

        for batch in train_loader.iter() {
            let n      = batch.labels.dims()[0];
            let labels = batch.labels.clone();

            let (loss, logits) = model.forward_loss(batch);
            loss_sum += loss.clone().into_scalar().elem::<f64>() * n as f64;
            correct  += count_correct(logits, labels);
            seen     += n;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        let loss     = loss_sum / seen.max(1) as f64;
        let accuracy = correct as f64 / seen.max(1) as f64;
        if !loss.is_finite() {
            tracing::warn!("Epoch {}: training loss is {}", epoch, loss);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let validation = if has_validation {
            evaluate_batches(&model.valid(), val_loader.iter())
        } else {
            None
        };

        let metrics = EpochMetrics {
            epoch,
            loss,
            accuracy,
            val_loss:     validation.map(|v| v.loss),
            val_accuracy: validation.map(|v| v.accuracy),
        };
        println!("{}", format_epoch(&metrics, cfg.epochs));
        history.push(metrics);
    }

    tracing::info!("Training took {:.1}s", started.elapsed().as_secs_f64());
    Ok((model, history))
}

fn format_epoch(m: &EpochMetrics, epochs: usize) -> String {
    let mut line = format!(
        "Epoch {:>3}/{} | loss={:.4} | accuracy={:.2}%",
        m.epoch,
        epochs,
        m.loss,
        m.accuracy * 100.0,
    );
    if let (Some(val_loss), Some(val_accuracy)) = (m.val_loss, m.val_accuracy) {
        line.push_str(&format!(
            " | val_loss={:.4} | val_accuracy={:.2}%",
            val_loss,
            val_accuracy * 100.0
        ));
    }
    line
}
