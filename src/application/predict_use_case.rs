// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Runs a trained model on external image files:
//
//   Step 1: Resolve the expected digits   (Layer 4 - data)
//           --labels JSON, or the file-index convention when
//           explicitly asked for, or nothing at all
//   Step 2: For i in 0..count load "<i>.<ext>"
//           and normalise it               (Layer 4 - data)
//   Step 3: Predict                        (Layer 5 - ml)
//   Step 4: Score against the expected digits, draw every
//           image to inference.png and the wrong ones to
//           misclassified.png              (Layer 6 - infra)
//
// A missing or unreadable image is fatal. Without expected
// digits the predictions are still reported but accuracy is
// not computed.

use anyhow::{ensure, Context, Result};
use std::path::{Path, PathBuf};

use crate::application::config::InferenceConfig;
use crate::data::{loader::load_ground_truth, preprocessor::Preprocessor};
use crate::domain::{
    ground_truth::GroundTruth,
    image::{Label, NormalizedImage, Prediction},
    traits::DigitRecognizer,
};
use crate::infra::visualizer::{save_prediction_grid, Thumbnail};
use crate::ml::{
    backend::{default_device, InferBackend},
    inferencer::Inferencer,
};

// ─── Report ───────────────────────────────────────────────────────────────────
/// Outcome for one image file.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub file_name:  String,
    pub image:      NormalizedImage,
    pub prediction: Prediction,
    pub expected:   Option<Label>,
}

impl ImageResult {
    /// `None` when no expected digit was supplied for this file
    pub fn is_correct(&self) -> Option<bool> {
        self.expected.map(|e| e == self.prediction.label)
    }

    fn thumbnail(&self) -> Thumbnail<'_> {
        Thumbnail { image: &self.image, predicted: self.prediction.label, expected: self.expected }
    }
}

/// All results of one inference run, in file order.
#[derive(Debug, Clone, Default)]
pub struct InferenceReport {
    pub results: Vec<ImageResult>,
}

impl InferenceReport {
    /// Number of images with a known expected digit
    pub fn labelled(&self) -> usize {
        self.results.iter().filter(|r| r.expected.is_some()).count()
    }

    pub fn correct(&self) -> usize {
        self.results.iter().filter(|r| r.is_correct() == Some(true)).count()
    }

    /// Percentage of labelled images predicted correctly
    pub fn accuracy(&self) -> Option<f64> {
        let labelled = self.labelled();
        (labelled > 0).then(|| self.correct() as f64 / labelled as f64 * 100.0)
    }

    pub fn misclassified(&self) -> impl Iterator<Item = &ImageResult> {
        self.results.iter().filter(|r| r.is_correct() == Some(false))
    }

    /// Grid of every image with its prediction, `cols` per row.
    pub fn save_all(&self, path: &Path, cols: usize) -> Result<bool> {
        let thumbnails: Vec<Thumbnail<'_>> = self.results.iter().map(ImageResult::thumbnail).collect();
        save_prediction_grid(&thumbnails, cols, path)
    }

    /// Write the one-row strip of misclassified images. Returns whether
    /// anything was written.
    pub fn save_misclassified(&self, path: &Path) -> Result<bool> {
        let thumbnails: Vec<Thumbnail<'_>> = self.misclassified().map(ImageResult::thumbnail).collect();
        save_prediction_grid(&thumbnails, thumbnails.len(), path)
    }

    /// Both inference pictures into `dir`.
    pub fn save_grids(&self, dir: &Path, cols: usize) -> Result<()> {
        self.save_all(&dir.join("inference.png"), cols)?;
        self.save_misclassified(&dir.join("misclassified.png"))?;
        Ok(())
    }
}

// ─── Core loop ────────────────────────────────────────────────────────────────
/// Expected digits as configured, if any.
pub fn resolve_ground_truth(cfg: &InferenceConfig) -> Result<Option<GroundTruth>> {
    if let Some(path) = &cfg.labels {
        let truth = load_ground_truth(Path::new(path))?;
        if truth.is_empty() {
            tracing::warn!("'{}' lists no expected labels; accuracy will not be computed", path);
        }
        tracing::info!("Loaded {} expected labels from '{}'", truth.len(), path);
        return Ok(Some(truth));
    }
    if cfg.labels_from_names {
        tracing::info!("Using file indices as expected labels");
        return Ok(Some(GroundTruth::from_file_indices(cfg.count, &cfg.extension)));
    }
    Ok(None)
}

/// Load, normalise and classify `<i>.<ext>` for every i below `cfg.count`.
pub fn run_inference<R: DigitRecognizer>(
    recognizer: &R,
    cfg:        &InferenceConfig,
    truth:      Option<&GroundTruth>,
) -> Result<InferenceReport> {
    let preprocessor = Preprocessor::new();
    let dir = Path::new(&cfg.images_dir);
    let mut report = InferenceReport::default();

    for i in 0..cfg.count {
        let file_name = format!("{i}.{}", cfg.extension);
        let path = dir.join(&file_name);

        let picture = image::open(&path)
            .with_context(|| format!("Cannot open image '{}'", path.display()))?;
        let normalized = preprocessor
            .from_dynamic_image(&picture)
            .with_context(|| format!("Cannot use image '{}'", path.display()))?;
        let prediction = recognizer.recognize(&normalized)?;
        let expected = truth.and_then(|t| t.label_for(&file_name));

        tracing::debug!(
            "{}: predicted {} ({:.1}%)",
            file_name,
            prediction.label,
            prediction.confidence() * 100.0
        );

        report.results.push(ImageResult { file_name, image: normalized, prediction, expected });
    }

    Ok(report)
}

// ─── PredictUseCase ───────────────────────────────────────────────────────────
/// Inference with a model loaded from disk.
pub struct PredictUseCase {
    inferencer: Inferencer<InferBackend>,
    config:     InferenceConfig,
    output_dir: PathBuf,
    grid_cols:  usize,
}

impl PredictUseCase {
    /// Load the model archive at `model_path`.
    pub fn new(
        model_path: &Path,
        config:     InferenceConfig,
        output_dir: impl Into<PathBuf>,
        grid_cols:  usize,
    ) -> Result<Self> {
        ensure!(grid_cols > 0, "grid needs at least one column");
        let inferencer = Inferencer::from_archive(model_path, default_device())?;
        Ok(Self { inferencer, config, output_dir: output_dir.into(), grid_cols })
    }

    /// Classify the configured images; writes inference.png, plus
    /// misclassified.png when anything was wrong.
    pub fn execute(&self) -> Result<InferenceReport> {
        let truth  = resolve_ground_truth(&self.config)?;
        let report = run_inference(&self.inferencer, &self.config, truth.as_ref())?;

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Cannot create '{}'", self.output_dir.display()))?;
        report.save_grids(&self.output_dir, self.grid_cols)?;

        Ok(report)
    }
}
