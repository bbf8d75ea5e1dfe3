// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns raw dataset values into what the network consumes.
//
// Steps:
//   1. Rescale every pixel from 0..=255 to [0, 1] (divide by 255).
//      The input domain is already bounded so no clipping is needed.
//   2. Add a trailing channel dimension of size 1 (28x28 → 28x28x1).
//   3. Encode each integer label as a length-10 one-hot vector.
//
// The SAME code path is used for the train split, the test split
// and for external images at inference time. Any drift between
// them would silently hurt accuracy (train/inference skew).
//
// Reference: Rust Book §13 (Iterators)

use anyhow::{ensure, Result};
use image::DynamicImage;

use crate::data::dataset::DigitSample;
use crate::domain::image::{Image, Label, NormalizedImage, OneHot, HEIGHT, WIDTH};
use crate::domain::split::DatasetSplit;

const MAX_INTENSITY: f32 = 255.0;

pub struct Preprocessor;

impl Preprocessor {
    /// Create a new Preprocessor instance
    pub fn new() -> Self {
        Self
    }

    /// Rescale one raw image to [0, 1] with a single trailing channel.
    pub fn normalize(&self, image: &Image) -> NormalizedImage {
        let values = image
            .pixels()
            .iter()
            .map(|&p| p as f32 / MAX_INTENSITY)
            .collect();
        NormalizedImage::from_scaled(values)
    }

    /// Encode a label as a one-hot vector of length 10.
    pub fn one_hot(&self, label: Label) -> OneHot {
        OneHot::encode(label)
    }

    /// Apply normalisation and one-hot encoding to every pair in a split.
    pub fn preprocess_split(&self, split: &DatasetSplit) -> Vec<DigitSample> {
        split
            .iter()
            .map(|(image, label)| DigitSample {
                image:  self.normalize(image),
                target: self.one_hot(label),
                label,
            })
            .collect()
    }

    /// Normalise an externally supplied picture the same way as the
    /// dataset images.
    ///
    /// Any colour depth is accepted: the picture is converted to 8-bit
    /// RGB and only the first channel is kept. It must already be 28x28.
    pub fn from_dynamic_image(&self, picture: &DynamicImage) -> Result<NormalizedImage> {
        let rgb = picture.to_rgb8();
        ensure!(
            rgb.width() as usize == WIDTH && rgb.height() as usize == HEIGHT,
            "expected a {}x{} image, got {}x{}",
            WIDTH,
            HEIGHT,
            rgb.width(),
            rgb.height()
        );

        // ImageBuffer pixels iterate row by row, matching our layout
        let raw: Vec<u8> = rgb.pixels().map(|p| p.0[0]).collect();
        Ok(self.normalize(&Image::new(raw)?))
    }
}

/// Implement Default so Preprocessor can be created with Preprocessor::default()
impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::{CHANNELS, PIXELS};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn ramp_image() -> Image {
        // covers 0 and 255 plus everything in between
        let pixels = (0..PIXELS).map(|i| (i % 256) as u8).collect();
        Image::new(pixels).unwrap()
    }

    #[test]
    fn test_normalized_values_in_unit_range() {
        let p = Preprocessor::new();
        let n = p.normalize(&ramp_image());
        assert!(n.values().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(n.values()[0], 0.0);
        assert_eq!(n.values()[255], 1.0);
    }

    #[test]
    fn test_normalized_shape_has_trailing_channel() {
        let p = Preprocessor::new();
        let n = p.normalize(&Image::blank());
        assert_eq!(n.shape(), [HEIGHT, WIDTH, CHANNELS]);
        assert_eq!(n.values().len(), PIXELS * CHANNELS);
    }

    #[test]
    fn test_preprocess_split_keeps_order() {
        let p = Preprocessor::new();
        let labels: Vec<Label> = [3u8, 0, 9].iter().map(|&d| Label::new(d).unwrap()).collect();
        let split = DatasetSplit::new(vec![Image::blank(); 3], labels).unwrap();
        let samples = p.preprocess_split(&split);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].target.hot_index(), 3);
        assert_eq!(samples[2].target.hot_index(), 9);
        assert_eq!(samples[1].label.value(), 0);
    }

    #[test]
    fn test_external_image_uses_first_channel() {
        let p = Preprocessor::new();
        let mut rgb = RgbImage::new(28, 28);
        rgb.put_pixel(5, 2, Rgb([255, 0, 0]));
        let n = p.from_dynamic_image(&DynamicImage::ImageRgb8(rgb)).unwrap();
        assert_eq!(n.get(5, 2), 1.0);
        assert_eq!(n.get(0, 0), 0.0);
    }

    #[test]
    fn test_external_grayscale_matches_dataset_path() {
        let p = Preprocessor::new();
        let raw = ramp_image();
        let gray = GrayImage::from_fn(28, 28, |x, y| Luma([raw.get(x as usize, y as usize)]));
        let from_file = p.from_dynamic_image(&DynamicImage::ImageLuma8(gray)).unwrap();
        assert_eq!(from_file, p.normalize(&raw));
    }

    #[test]
    fn test_external_image_wrong_size_rejected() {
        let p = Preprocessor::new();
        let rgb = RgbImage::new(32, 32);
        assert!(p.from_dynamic_image(&DynamicImage::ImageRgb8(rgb)).is_err());
    }
}
