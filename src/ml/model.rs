use anyhow::{bail, ensure, Result};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{log_softmax, relu, softmax},
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::DigitBatch;
use crate::domain::image::{CHANNELS, HEIGHT, NUM_CLASSES, WIDTH};

// ─── Layer records ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Softmax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// Output keeps the input's spatial size (odd kernels only)
    Same,
    /// No padding, output shrinks by `kernel - 1`
    Valid,
}

/// One entry of a sequential topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        filters:    usize,
        kernel:     usize,
        padding:    Padding,
        activation: Activation,
    },
    MaxPool {
        size:   usize,
        stride: usize,
    },
    Flatten,
    Dense {
        units:      usize,
        activation: Activation,
    },
}

/// Ordered layer records consumed by `build`.
// #[derive(Config)] brings its own Clone and serde impls.
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Input shape as (height, width, channels)
    pub input:  [usize; 3],
    pub layers: Vec<LayerSpec>,
}

/// A validated layer with its resolved input/output sizes.
#[derive(Debug, Clone, PartialEq)]
enum PlannedLayer {
    Conv { in_channels: usize, filters: usize, kernel: usize, padding: Padding, output: [usize; 3] },
    Pool { size: usize, stride: usize, output: [usize; 3] },
    Flatten { features: usize },
    Dense { inputs: usize, units: usize, activation: Activation },
}

/// One row of the model summary.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub name:         String,
    pub output_shape: Vec<usize>,
    pub params:       usize,
}

impl ModelConfig {
    /// The digit classifier:
    /// conv(32) → pool → conv(64) → pool → flatten → dense(128) → dense(10, softmax)
    pub fn digits() -> Self {
        use LayerSpec::*;
        Self::new(
            [HEIGHT, WIDTH, CHANNELS],
            vec![
                Conv2d { filters: 32, kernel: 3, padding: Padding::Same, activation: Activation::Relu },
                MaxPool { size: 2, stride: 2 },
                Conv2d { filters: 64, kernel: 3, padding: Padding::Same, activation: Activation::Relu },
                MaxPool { size: 2, stride: 2 },
                Flatten,
                Dense { units: 128, activation: Activation::Relu },
                Dense { units: NUM_CLASSES, activation: Activation::Softmax },
            ],
        )
    }

    /// Walk the records, tracking the activation shape, and reject
    /// anything the builder cannot turn into a model.
    fn plan(&self) -> Result<Vec<PlannedLayer>> {
        // batches are always [N, 1, 28, 28]
        ensure!(
            self.input == [HEIGHT, WIDTH, CHANNELS],
            "input shape {:?} does not match the {}x{}x{} digit images",
            self.input,
            HEIGHT,
            WIDTH,
            CHANNELS
        );
        let [mut h, mut w, mut c] = self.input;

        let mut planned: Vec<PlannedLayer> = Vec::with_capacity(self.layers.len());
        let mut features: Option<usize> = None;

        for (i, layer) in self.layers.iter().enumerate() {
            match *layer {
                LayerSpec::Conv2d { filters, kernel, padding, activation } => {
                    ensure!(features.is_none(), "layer {i}: convolution after flatten");
                    ensure!(filters > 0 && kernel > 0, "layer {i}: convolution needs filters and kernel > 0");
                    ensure!(activation == Activation::Relu, "layer {i}: convolutions only support relu");
                    match padding {
                        Padding::Same => {
                            ensure!(kernel % 2 == 1, "layer {i}: same padding needs an odd kernel");
                        }
                        Padding::Valid => {
                            ensure!(h >= kernel && w >= kernel, "layer {i}: kernel {kernel} larger than {h}x{w} input");
                            h = h - kernel + 1;
                            w = w - kernel + 1;
                        }
                    }
                    planned.push(PlannedLayer::Conv {
                        in_channels: c, filters, kernel, padding, output: [h, w, filters],
                    });
                    c = filters;
                }
                LayerSpec::MaxPool { size, stride } => {
                    ensure!(features.is_none(), "layer {i}: pooling after flatten");
                    ensure!(
                        matches!(planned.last(), Some(PlannedLayer::Conv { .. })),
                        "layer {i}: pooling must directly follow a convolution"
                    );
                    ensure!(size > 0 && stride > 0, "layer {i}: pool size and stride must be > 0");
                    ensure!(h >= size && w >= size, "layer {i}: pool {size} larger than {h}x{w} input");
                    h = (h - size) / stride + 1;
                    w = (w - size) / stride + 1;
                    planned.push(PlannedLayer::Pool { size, stride, output: [h, w, c] });
                }
                LayerSpec::Flatten => {
                    ensure!(features.is_none(), "layer {i}: flattened twice");
                    let n = h * w * c;
                    features = Some(n);
                    planned.push(PlannedLayer::Flatten { features: n });
                }
                LayerSpec::Dense { units, activation } => {
                    let Some(inputs) = features else {
                        bail!("layer {i}: dense layer before flatten");
                    };
                    ensure!(units > 0, "layer {i}: dense layer needs units > 0");
                    planned.push(PlannedLayer::Dense { inputs, units, activation });
                    features = Some(units);
                }
            }
        }

        let dense: Vec<(usize, Activation)> = planned
            .iter()
            .filter_map(|l| match l {
                PlannedLayer::Dense { units, activation, .. } => Some((*units, *activation)),
                _ => None,
            })
            .collect();

        let Some(((out_units, out_activation), hidden)) = dense.split_last() else {
            bail!("topology has no dense output layer");
        };
        ensure!(
            matches!(planned.last(), Some(PlannedLayer::Dense { .. })),
            "topology must end with a dense layer"
        );
        ensure!(*out_activation == Activation::Softmax, "output layer must use softmax");
        ensure!(*out_units == NUM_CLASSES, "output layer must have {NUM_CLASSES} units, has {out_units}");
        ensure!(
            hidden.iter().all(|(_, a)| *a == Activation::Relu),
            "hidden dense layers only support relu"
        );

        Ok(planned)
    }

    /// Check the topology without allocating any parameters.
    pub fn validate(&self) -> Result<()> {
        self.plan().map(|_| ())
    }

    /// Per-layer output shape and parameter count.
    pub fn summary(&self) -> Result<Vec<LayerSummary>> {
        let rows = self
            .plan()?
            .into_iter()
            .map(|layer| match layer {
                PlannedLayer::Conv { in_channels, filters, kernel, output, .. } => LayerSummary {
                    name:         format!("conv2d {kernel}x{kernel}"),
                    output_shape: output.to_vec(),
                    params:       kernel * kernel * in_channels * filters + filters,
                },
                PlannedLayer::Pool { size, stride, output } => LayerSummary {
                    name:         format!("max_pool {size}x{size}/{stride}"),
                    output_shape: output.to_vec(),
                    params:       0,
                },
                PlannedLayer::Flatten { features } => LayerSummary {
                    name:         "flatten".to_string(),
                    output_shape: vec![features],
                    params:       0,
                },
                PlannedLayer::Dense { inputs, units, activation } => LayerSummary {
                    name:         format!("dense ({activation:?})").to_lowercase(),
                    output_shape: vec![units],
                    params:       inputs * units + units,
                },
            })
            .collect();
        Ok(rows)
    }

    /// Build a freshly initialised model from the layer records.
    pub fn build<B: Backend>(&self, device: &B::Device) -> Result<DigitClassifier<B>> {
        let mut stages: Vec<ConvStage<B>> = Vec::new();
        let mut dense: Vec<Linear<B>> = Vec::new();

        for layer in self.plan()? {
            match layer {
                PlannedLayer::Conv { in_channels, filters, kernel, padding, .. } => {
                    let padding = match padding {
                        Padding::Same  => PaddingConfig2d::Same,
                        Padding::Valid => PaddingConfig2d::Valid,
                    };
                    let conv = Conv2dConfig::new([in_channels, filters], [kernel, kernel])
                        .with_padding(padding)
                        .init(device);
                    stages.push(ConvStage { conv, pool: None });
                }
                PlannedLayer::Pool { size, stride, .. } => {
                    let pool = MaxPool2dConfig::new([size, size])
                        .with_strides([stride, stride])
                        .init();
                    // plan() guarantees a pool directly follows a convolution
                    if let Some(stage) = stages.last_mut() {
                        stage.pool = Some(pool);
                    }
                }
                PlannedLayer::Flatten { .. } => {}
                PlannedLayer::Dense { inputs, units, .. } => {
                    dense.push(LinearConfig::new(inputs, units).init(device));
                }
            }
        }

        let Some(output) = dense.pop() else {
            bail!("topology has no dense output layer");
        };

        Ok(DigitClassifier { stages, hidden: dense, output })
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────

/// Convolution + ReLU, optionally followed by max pooling.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    pub conv: Conv2d<B>,
    pub pool: Option<MaxPool2d>,
}

/// Sequential CNN: conv stages → flatten → ReLU dense layers → softmax output.
#[derive(Module, Debug)]
pub struct DigitClassifier<B: Backend> {
    pub stages: Vec<ConvStage<B>>,
    pub hidden: Vec<Linear<B>>,
    pub output: Linear<B>,
}

impl<B: Backend> DigitClassifier<B> {
    /// images: [batch, 1, 28, 28] → logits: [batch, 10]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for stage in &self.stages {
            x = relu(stage.conv.forward(x));
            if let Some(pool) = &stage.pool {
                x = pool.forward(x);
            }
        }

        let mut x = x.flatten::<2>(1, 3);
        for linear in &self.hidden {
            x = relu(linear.forward(x));
        }
        self.output.forward(x)
    }

    /// images: [batch, 1, 28, 28] → class probabilities: [batch, 10]
    pub fn forward_probs(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    /// Categorical cross-entropy of a batch, plus the logits for metrics.
    pub fn forward_loss(&self, batch: DigitBatch<B>) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(batch.images);
        let loss = categorical_cross_entropy(logits.clone(), batch.targets);
        (loss, logits)
    }
}

/// Mean of `-Σ target · log(softmax(logits))` over the batch.
/// `targets` are one-hot rows: [batch, classes].
pub fn categorical_cross_entropy<B: Backend>(
    logits:  Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    (targets * log_softmax(logits, 1)).sum_dim(1).mean().neg()
}
