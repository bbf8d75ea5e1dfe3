// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Holds a trained model plus the device it lives on and
// answers "which digit is this?" for preprocessed images.
// Built either from a model still in memory after training
// or from a saved archive.
use anyhow::{anyhow, Result};
use burn::prelude::*;
use std::path::Path;

use crate::domain::image::{NormalizedImage, Prediction};
use crate::domain::traits::DigitRecognizer;
use crate::infra::archive;
use crate::ml::{evaluator::predict_batch, model::DigitClassifier};

pub struct Inferencer<B: Backend> {
    model:  DigitClassifier<B>,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: DigitClassifier<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Rebuild the model from a saved archive.
    pub fn from_archive(path: &Path, device: B::Device) -> Result<Self> {
        let (model, _) = archive::load::<B>(path, &device)?;
        tracing::info!("Model loaded from '{}'", path.display());
        Ok(Self { model, device })
    }

    /// Predict every image in one forward pass.
    pub fn predict_many(&self, images: &[NormalizedImage]) -> Result<Vec<Prediction>> {
        predict_batch(&self.model, images, &self.device)
    }
}

impl<B: Backend> DigitRecognizer for Inferencer<B> {
    fn recognize(&self, image: &NormalizedImage) -> Result<Prediction> {
        let mut predictions = self.predict_many(std::slice::from_ref(image))?;
        predictions
            .pop()
            .ok_or_else(|| anyhow!("Model returned no prediction"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::Preprocessor;
    use crate::domain::image::{Image, PIXELS};
    use crate::ml::model::ModelConfig;

    type TestBackend = burn::backend::NdArray<f32>;

    fn inferencer() -> Inferencer<TestBackend> {
        let device = Default::default();
        let model = ModelConfig::digits().build(&device).unwrap();
        Inferencer::new(model, device)
    }

    #[test]
    fn test_all_zero_image_end_to_end() {
        let p = Preprocessor::new();
        let image = p.normalize(&Image::blank());
        let prediction = inferencer().recognize(&image).unwrap();

        assert_eq!(prediction.probabilities.len(), 10);
        assert!(prediction.probabilities.iter().all(|&v| v >= 0.0));
        assert!((prediction.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        let best = prediction
            .probabilities
            .iter()
            .cloned()
            .fold(f32::MIN, f32::max);
        assert_eq!(prediction.confidence(), best);
    }

    #[test]
    fn test_batch_matches_single_predictions() {
        let p = Preprocessor::new();
        let inf = inferencer();
        let images = vec![
            p.normalize(&Image::blank()),
            p.normalize(&Image::new(vec![255; PIXELS]).unwrap()),
        ];

        let batch = inf.predict_many(&images).unwrap();
        assert_eq!(batch.len(), 2);
        for (image, from_batch) in images.iter().zip(&batch) {
            let single = inf.recognize(image).unwrap();
            assert_eq!(single.label, from_batch.label);
            for (a, b) in single.probabilities.iter().zip(&from_batch.probabilities) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_empty_batch() {
        assert!(inferencer().predict_many(&[]).unwrap().is_empty());
    }
}
