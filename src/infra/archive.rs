// ============================================================
// Layer 6 — Model Archive
// ============================================================
// Saves a trained model to ONE file that is enough to run
// inference later without retraining.
//
// What goes into the file:
//   1. architecture — the ModelConfig layer records as JSON
//   2. weights      — every learned parameter
//
// Loading reads the architecture first, rebuilds an empty
// model from it, then restores the weights into that model.
//
// Burn's NamedMpkGzFileRecorder:
//   - Serialises records to named MessagePack
//   - Compresses with gzip
//   - FullPrecisionSettings so a reloaded model predicts
//     exactly what the saved one did
//
// File naming: "output/model", "output/model.mpk" and
// "output/model.mpk.gz" all refer to the same file. Dots in the
// name itself are kept ("model.v2" → "model.v2.mpk.gz"); the
// recorder replaces the last extension, so it is always handed
// "<name>.mpk".
//
// No versioning or integrity checks.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Record, Recorder},
};

use crate::ml::model::{DigitClassifier, DigitClassifierRecord, ModelConfig};

const EXTENSION: &str = ".mpk.gz";

/// Everything stored in a model file.
#[derive(Record)]
pub struct ModelArchive<B: Backend> {
    /// ModelConfig serialised as JSON
    pub architecture: String,
    pub weights:      DigitClassifierRecord<B>,
}

fn recorder() -> NamedMpkGzFileRecorder<FullPrecisionSettings> {
    NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
}

/// File name without the archive extension
fn stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(EXTENSION).or_else(|| name.strip_suffix(".mpk")) {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

/// What the recorder is given: its set_extension turns ".mpk" into ".mpk.gz"
fn recorder_path(path: &Path) -> PathBuf {
    path.with_file_name(format!("{}.mpk", stem(path)))
}

/// Final on-disk location for `path`
pub fn file_path(path: &Path) -> PathBuf {
    path.with_file_name(format!("{}{EXTENSION}", stem(path)))
}

/// Write architecture + weights. Returns the file written.
pub fn save<B: Backend>(
    model:  &DigitClassifier<B>,
    config: &ModelConfig,
    path:   &Path,
) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }

    let archive = ModelArchive::<B> {
        architecture: serde_json::to_string(config)?,
        weights:      model.clone().into_record(),
    };

    recorder()
        .record(archive, recorder_path(path))
        .with_context(|| format!("Failed to save model to '{}'", file_path(path).display()))?;

    let written = file_path(path);
    tracing::info!("Saved model to '{}'", written.display());
    Ok(written)
}

/// Rebuild a model (and its config) from a file written by `save`.
pub fn load<B: Backend>(
    path:   &Path,
    device: &B::Device,
) -> Result<(DigitClassifier<B>, ModelConfig)> {
    let archive: ModelArchive<B> = recorder()
        .load(recorder_path(path), device)
        .with_context(|| {
            format!(
                "Cannot load model '{}'. Has a model been trained and saved?",
                file_path(path).display()
            )
        })?;

    let config: ModelConfig = serde_json::from_str(&archive.architecture)
        .context("Model file holds an unreadable architecture")?;

    let model = config.build::<B>(device)?.load_record(archive.weights);
    tracing::debug!("Restored {} parameters", model.num_params());
    Ok((model, config))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::Preprocessor;
    use crate::domain::image::{Image, PIXELS};
    use crate::domain::traits::DigitRecognizer;
    use crate::ml::inferencer::Inferencer;

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn test_file_path_normalises_extension() {
        let expected = PathBuf::from("out/model.mpk.gz");
        assert_eq!(file_path(Path::new("out/model")), expected);
        assert_eq!(file_path(Path::new("out/model.mpk")), expected);
        assert_eq!(file_path(Path::new("out/model.mpk.gz")), expected);
    }

    #[test]
    fn test_dotted_model_name_is_kept() {
        assert_eq!(file_path(Path::new("out/model.v2")), PathBuf::from("out/model.v2.mpk.gz"));

        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = ModelConfig::digits();
        let model: DigitClassifier<TestBackend> = config.build(&device).unwrap();

        let written = save(&model, &config, &dir.path().join("model.v2")).unwrap();
        assert_eq!(written, dir.path().join("model.v2.mpk.gz"));
        assert!(written.exists());
        assert!(!dir.path().join("model.mpk.gz").exists());
        assert!(load::<TestBackend>(&dir.path().join("model.v2"), &device).is_ok());
    }

    #[test]
    fn test_save_then_load_predicts_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = ModelConfig::digits();
        let model: DigitClassifier<TestBackend> = config.build(&device).unwrap();

        let written = save(&model, &config, &dir.path().join("model")).unwrap();
        assert!(written.exists());

        let (reloaded, reloaded_cfg) = load::<TestBackend>(&written, &device).unwrap();
        assert_eq!(reloaded_cfg.layers, config.layers);

        let p = Preprocessor::new();
        let pixels = (0..PIXELS).map(|i| (i * 7 % 256) as u8).collect();
        let image = p.normalize(&Image::new(pixels).unwrap());

        let before = Inferencer::new(model, device.clone()).recognize(&image).unwrap();
        let after  = Inferencer::new(reloaded, device).recognize(&image).unwrap();
        assert_eq!(before.label, after.label);
        for (a, b) in before.probabilities.iter().zip(&after.probabilities) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_rejects_foreign_input_shape() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let good = ModelConfig::digits();
        let model: DigitClassifier<TestBackend> = good.build(&device).unwrap();

        let mut foreign = good.clone();
        foreign.input = [14, 14, 1];
        let written = save(&model, &foreign, &dir.path().join("model")).unwrap();

        let err = load::<TestBackend>(&written, &device).unwrap_err();
        assert!(format!("{err:#}").contains("input shape"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load::<TestBackend>(&dir.path().join("absent"), &Default::default());
        assert!(result.is_err());
    }
}
