// ============================================================
// Layer 3 — Image and Label Domain Types
// ============================================================
// The values that flow through every other layer:
//
//   Image           → raw 28x28 grid of 0..=255 intensities
//   NormalizedImage → the same grid as f32 in [0, 1] with a
//                     trailing channel dimension of size 1
//                     (shape 28 x 28 x 1, row-major)
//   Label           → a digit class 0..=9
//   OneHot          → a label encoded as a length-10 vector
//   Prediction      → what the model said about one image
//
// Reference: Rust Book §5 (Structs), §9 (Error Handling)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Image width in pixels
pub const WIDTH: usize = 28;

/// Image height in pixels
pub const HEIGHT: usize = 28;

/// Intensity channels kept after preprocessing
pub const CHANNELS: usize = 1;

/// Pixels per image
pub const PIXELS: usize = WIDTH * HEIGHT;

/// Number of digit classes
pub const NUM_CLASSES: usize = 10;

// ─── Image ────────────────────────────────────────────────────────────────────
/// A raw grayscale digit image exactly as it comes from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Row-major intensities, `PIXELS` long
    pixels: Vec<u8>,
}

impl Image {
    /// Wrap a row-major pixel buffer. Fails unless it holds exactly
    /// 28 x 28 values.
    pub fn new(pixels: Vec<u8>) -> Result<Self> {
        ensure!(
            pixels.len() == PIXELS,
            "expected {} pixels ({}x{}), got {}",
            PIXELS,
            WIDTH,
            HEIGHT,
            pixels.len()
        );
        Ok(Self { pixels })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
impl Image {
    /// An all-black image
    pub fn blank() -> Self {
        Self { pixels: vec![0; PIXELS] }
    }

    /// Intensity at row `y`, column `x`
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * WIDTH + x]
    }
}

// ─── NormalizedImage ──────────────────────────────────────────────────────────
/// A model-ready image: values in [0, 1], shape 28 x 28 x 1.
///
/// Only the preprocessor creates these, so every instance
/// satisfies the range invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedImage {
    values: Vec<f32>,
}

impl NormalizedImage {
    /// Wrap values the caller has already scaled into [0, 1].
    pub(crate) fn from_scaled(values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), PIXELS * CHANNELS);
        debug_assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at row `y`, column `x` of the single channel
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[(y * WIDTH + x) * CHANNELS]
    }
}

#[cfg(test)]
impl NormalizedImage {
    /// Shape as (height, width, channels)
    pub fn shape(&self) -> [usize; 3] {
        [HEIGHT, WIDTH, CHANNELS]
    }
}

// ─── Label ────────────────────────────────────────────────────────────────────
/// A digit class. Always in 0..=9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Label(u8);

impl Label {
    pub fn new(value: u8) -> Result<Self> {
        ensure!(
            (value as usize) < NUM_CLASSES,
            "label {} is outside 0..{}",
            value,
            NUM_CLASSES
        );
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for Label {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Label::new(value)
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        label.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── OneHot ───────────────────────────────────────────────────────────────────
/// Categorical encoding of a label: exactly one entry is 1.0,
/// at the label's index, every other entry is 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OneHot([f32; NUM_CLASSES]);

impl OneHot {
    pub fn encode(label: Label) -> Self {
        let mut v = [0.0f32; NUM_CLASSES];
        v[label.index()] = 1.0;
        Self(v)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[cfg(test)]
impl OneHot {
    /// The position of the 1.0 entry
    pub fn hot_index(&self) -> usize {
        self.0
            .iter()
            .position(|&v| v == 1.0)
            .unwrap_or_default()
    }
}

// ─── Prediction ───────────────────────────────────────────────────────────────
/// Model output for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// argmax of `probabilities`
    pub label: Label,

    /// Softmax distribution over the ten classes
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Build from a probability vector, picking the most likely class.
    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self> {
        ensure!(
            probabilities.len() == NUM_CLASSES,
            "expected {} class probabilities, got {}",
            NUM_CLASSES,
            probabilities.len()
        );
        let best = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or_default();
        Ok(Self {
            label: Label::new(best as u8)?,
            probabilities,
        })
    }

    /// Probability assigned to the predicted class
    pub fn confidence(&self) -> f32 {
        self.probabilities[self.label.index()]
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_requires_full_grid() {
        assert!(Image::new(vec![0; PIXELS]).is_ok());
        assert!(Image::new(vec![0; PIXELS - 1]).is_err());
    }

    #[test]
    fn test_label_range() {
        assert!(Label::new(9).is_ok());
        assert!(Label::new(10).is_err());
    }

    #[test]
    fn test_label_deserialize_rejects_out_of_range() {
        let ok: Label = serde_json::from_str("7").unwrap();
        assert_eq!(ok.value(), 7);
        assert!(serde_json::from_str::<Label>("12").is_err());
    }

    #[test]
    fn test_one_hot_has_single_entry_at_label() {
        for digit in 0..10u8 {
            let hot = OneHot::encode(Label::new(digit).unwrap());
            let ones = hot.as_slice().iter().filter(|&&v| v == 1.0).count();
            let zeros = hot.as_slice().iter().filter(|&&v| v == 0.0).count();
            assert_eq!(ones, 1);
            assert_eq!(zeros, NUM_CLASSES - 1);
            assert_eq!(hot.hot_index(), digit as usize);
        }
    }

    #[test]
    fn test_prediction_picks_argmax() {
        let mut probs = vec![0.05; NUM_CLASSES];
        probs[4] = 0.55;
        let p = Prediction::from_probabilities(probs).unwrap();
        assert_eq!(p.label.value(), 4);
        assert!((p.confidence() - 0.55).abs() < 1e-6);
    }
}
