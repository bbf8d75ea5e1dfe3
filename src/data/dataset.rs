use burn::data::dataset::Dataset;

use crate::domain::image::{Label, NormalizedImage, OneHot};

/// One preprocessed training example.
#[derive(Debug, Clone)]
pub struct DigitSample {
    pub image:  NormalizedImage,
    pub target: OneHot,
    pub label:  Label,
}

pub struct DigitDataset {
    samples: Vec<DigitSample>,
}

impl DigitDataset {
    pub fn new(samples: Vec<DigitSample>) -> Self { Self { samples } }
}

impl Dataset<DigitSample> for DigitDataset {
    fn get(&self, index: usize) -> Option<DigitSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
