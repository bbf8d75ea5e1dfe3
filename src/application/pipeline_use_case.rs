// ============================================================
// Layer 2 — PipelineUseCase
// ============================================================
// Runs the whole experiment top to bottom:
//
//   Step 1: Load the train/test splits      (Layer 4 - data)
//   Step 2: Normalise + one-hot encode      (Layer 4 - data)
//   Step 3: Log the model summary           (Layer 5 - ml)
//   Step 4: Train with validation           (Layer 5 - ml)
//   Step 5: Evaluate on the test split      (Layer 5 - ml)
//   Step 6: metrics.csv + training curves   (Layer 6 - infra)
//   Step 7: Prediction grid of test images  (Layer 6 - infra)
//   Step 8: Save model + run_config.json    (Layer 6 - infra)
//   Step 9: Optional external inference     (Layer 2 - predict)
//           with inference.png / misclassified.png
//
// Any failing step aborts the run.
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Context, Result};
use std::path::{Path, PathBuf};
use burn::module::AutodiffModule;

use crate::application::{
    config::{DatasetChoice, RunConfig},
    predict_use_case::{resolve_ground_truth, run_inference, InferenceReport},
};
use crate::data::{
    loader::{BurnMnistSource, IdxDirSource},
    preprocessor::Preprocessor,
};
use crate::domain::traits::DatasetSource;
use crate::infra::{
    archive,
    metrics::{History, MetricsLogger},
    visualizer::{save_prediction_grid, save_training_curves, Thumbnail},
};
use crate::ml::{
    backend::{default_device, InferBackend, TrainBackend},
    evaluator::{evaluate, predict_batch, Evaluation},
    inferencer::Inferencer,
    model::{DigitClassifier, ModelConfig},
    trainer::run_training,
};

/// What a finished run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub history:    History,
    pub test:       Evaluation,
    /// The saved model file
    pub model_path: PathBuf,
    pub inference:  Option<InferenceReport>,
}

// ─── PipelineUseCase ──────────────────────────────────────────────────────────
pub struct PipelineUseCase {
    config: RunConfig,
    model:  ModelConfig,
}

impl PipelineUseCase {
    /// Pipeline with the reference digit topology
    pub fn new(config: RunConfig) -> Self {
        Self::with_model(config, ModelConfig::digits())
    }

    pub fn with_model(config: RunConfig, model: ModelConfig) -> Self {
        Self { config, model }
    }

    /// Execute the full pipeline end to end
    pub fn execute(&self) -> Result<PipelineOutcome> {
        let cfg = &self.config;
        self.model.validate()?;
        let out_dir = Path::new(&cfg.output_dir);
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Cannot create output directory '{}'", out_dir.display()))?;

        // ── Step 1: Load MNIST ────────────────────────────────────────────────
        let source: Box<dyn DatasetSource> = match &cfg.dataset {
            DatasetChoice::Download => Box::new(BurnMnistSource::new(cfg.limit)),
            DatasetChoice::IdxDir(dir) => Box::new(IdxDirSource::new(dir, cfg.limit)),
        };
        let (train_split, test_split) = source.load()?;
        ensure!(!train_split.is_empty(), "The training split holds no images");
        tracing::info!(
            "Loaded {} training and {} test images",
            train_split.len(),
            test_split.len()
        );

        // ── Step 2: Preprocess ────────────────────────────────────────────────
        let preprocessor  = Preprocessor::new();
        let train_samples = preprocessor.preprocess_split(&train_split);
        let test_samples  = preprocessor.preprocess_split(&test_split);

        // ── Step 3: Model summary ─────────────────────────────────────────────
        log_summary(&self.model)?;

        // ── Step 4: Train ─────────────────────────────────────────────────────
        let device = default_device();
        let (model, history) =
            run_training::<TrainBackend>(&self.model, &cfg.train, train_samples, &device)?;
        let model: DigitClassifier<InferBackend> = model.valid();

        // ── Step 5: Test accuracy ─────────────────────────────────────────────
        let grid_len = cfg.grid_rows * cfg.grid_cols;
        let grid_samples: Vec<_> = test_samples.iter().take(grid_len).cloned().collect();
        let test = evaluate(&model, test_samples, cfg.train.batch_size, &device)?;
        tracing::info!("Test loss={:.4} accuracy={:.4}", test.loss, test.accuracy);

        // ── Step 6: Metrics + curves ──────────────────────────────────────────
        let logger = MetricsLogger::new(out_dir)?;
        logger.log_history(&history)?;
        tracing::info!("Wrote per-epoch metrics to '{}'", logger.csv_path().display());
        save_training_curves(&history, out_dir)?;

        // ── Step 7: Prediction grid ───────────────────────────────────────────
        let images: Vec<_> = grid_samples.iter().map(|s| s.image.clone()).collect();
        let predictions = predict_batch(&model, &images, &device)?;
        let thumbnails: Vec<Thumbnail<'_>> = grid_samples
            .iter()
            .zip(&predictions)
            .map(|(s, p)| Thumbnail { image: &s.image, predicted: p.label, expected: Some(s.label) })
            .collect();
        save_prediction_grid(&thumbnails, cfg.grid_cols, &out_dir.join("predictions.png"))?;

        // ── Step 8: Persist ───────────────────────────────────────────────────
        let model_path = archive::save(&model, &self.model, &out_dir.join(&cfg.model_name))?;
        save_run_config(cfg, out_dir)?;

        // ── Step 9: External images ───────────────────────────────────────────
        let inference = cfg
            .inference
            .as_ref()
            .map(|inf| -> Result<InferenceReport> {
                let truth = resolve_ground_truth(inf)?;
                let recognizer = Inferencer::new(model.clone(), device.clone());
                let report = run_inference(&recognizer, inf, truth.as_ref())?;
                report.save_grids(out_dir, cfg.grid_cols)?;
                Ok(report)
            })
            .transpose()?;

        Ok(PipelineOutcome { history, test, model_path, inference })
    }
}

fn log_summary(model: &ModelConfig) -> Result<()> {
    let rows = model.summary()?;
    let total: usize = rows.iter().map(|r| r.params).sum();
    for row in &rows {
        tracing::info!("{:<20} {:<16} {:>10}", row.name, format!("{:?}", row.output_shape), row.params);
    }
    tracing::info!("Total params: {}", total);
    Ok(())
}

/// Record the exact settings of the run next to the model.
fn save_run_config(cfg: &RunConfig, dir: &Path) -> Result<()> {
    let path = dir.join("run_config.json");
    let json = serde_json::to_string_pretty(cfg)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Saved run config to '{}'", path.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::{InferenceConfig, TrainConfig};
    use crate::ml::model::{Activation, LayerSpec};
    use image::{GrayImage, Luma};

    fn write_idx(dir: &Path, images_file: &str, labels_file: &str, count: usize) {
        let mut images = Vec::new();
        for word in [2051u32, count as u32, 28, 28] {
            images.extend_from_slice(&word.to_be_bytes());
        }
        let mut labels = Vec::new();
        for word in [2049u32, count as u32] {
            labels.extend_from_slice(&word.to_be_bytes());
        }
        for i in 0..count {
            let digit = (i % 2) as u8;
            images.extend(std::iter::repeat(digit * 255).take(28 * 28));
            labels.push(digit);
        }
        std::fs::write(dir.join(images_file), images).unwrap();
        std::fs::write(dir.join(labels_file), labels).unwrap();
    }

    fn linear_model() -> ModelConfig {
        ModelConfig::new(
            [28, 28, 1],
            vec![
                LayerSpec::Flatten,
                LayerSpec::Dense { units: 10, activation: Activation::Softmax },
            ],
        )
    }

    #[test]
    fn test_pipeline_writes_every_artifact() {
        let data = tempfile::tempdir().unwrap();
        write_idx(data.path(), "train-images-idx3-ubyte", "train-labels-idx1-ubyte", 40);
        write_idx(data.path(), "t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte", 12);

        let images = tempfile::tempdir().unwrap();
        for i in 0..2u8 {
            GrayImage::from_pixel(28, 28, Luma([i * 255]))
                .save(images.path().join(format!("{i}.png")))
                .unwrap();
        }

        let out = tempfile::tempdir().unwrap();
        let config = RunConfig {
            dataset:    DatasetChoice::IdxDir(data.path().to_string_lossy().into_owned()),
            output_dir: out.path().to_string_lossy().into_owned(),
            train:      TrainConfig { batch_size: 4, epochs: 2, learning_rate: 1e-2, ..TrainConfig::default() },
            inference:  Some(InferenceConfig {
                images_dir:        images.path().to_string_lossy().into_owned(),
                count:             2,
                extension:         "png".to_string(),
                labels:            None,
                labels_from_names: true,
            }),
            ..RunConfig::default()
        };

        let outcome = PipelineUseCase::with_model(config, linear_model()).execute().unwrap();

        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.test.count, 12);
        assert!(outcome.model_path.exists());
        let report = outcome.inference.unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.labelled(), 2);

        let files = ["metrics.csv", "accuracy.png", "loss.png", "predictions.png", "run_config.json", "inference.png"];
        for file in files {
            assert!(out.path().join(file).exists(), "{file} missing");
        }

        // the saved model reloads with its architecture
        let (_, reloaded) = archive::load::<InferBackend>(&outcome.model_path, &default_device()).unwrap();
        assert_eq!(reloaded.layers, linear_model().layers);
    }

    #[test]
    fn test_empty_training_split_fails() {
        let data = tempfile::tempdir().unwrap();
        write_idx(data.path(), "train-images-idx3-ubyte", "train-labels-idx1-ubyte", 0);
        write_idx(data.path(), "t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte", 2);

        let out = tempfile::tempdir().unwrap();
        let config = RunConfig {
            dataset:    DatasetChoice::IdxDir(data.path().to_string_lossy().into_owned()),
            output_dir: out.path().to_string_lossy().into_owned(),
            inference:  None,
            ..RunConfig::default()
        };
        let err = PipelineUseCase::with_model(config, linear_model()).execute().unwrap_err();
        assert!(err.to_string().contains("no images"));
    }

    #[test]
    fn test_missing_dataset_dir_fails() {
        let out = tempfile::tempdir().unwrap();
        let config = RunConfig {
            dataset:    DatasetChoice::IdxDir(out.path().join("absent").to_string_lossy().into_owned()),
            output_dir: out.path().to_string_lossy().into_owned(),
            ..RunConfig::default()
        };
        assert!(PipelineUseCase::with_model(config, linear_model()).execute().is_err());
    }

    /// Downloads MNIST on first use.
    #[test]
    #[ignore]
    fn test_reference_model_beats_ninety_percent_after_one_epoch() {
        let out = tempfile::tempdir().unwrap();
        let config = RunConfig {
            output_dir: out.path().to_string_lossy().into_owned(),
            train:      TrainConfig { epochs: 1, ..TrainConfig::default() },
            ..RunConfig::default()
        };
        let outcome = PipelineUseCase::new(config).execute().unwrap();
        assert!(outcome.test.accuracy > 0.9, "accuracy {}", outcome.test.accuracy);
    }
}
