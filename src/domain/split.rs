// ============================================================
// Layer 3 — Dataset Split Domain Type
// ============================================================
// An ordered pairing of images with their labels.
// The i-th label belongs to the i-th image, so the two
// collections must always have the same length.

use anyhow::{ensure, Result};

use crate::domain::image::{Image, Label};

/// One partition of the dataset (train or test).
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    images: Vec<Image>,
    labels: Vec<Label>,
}

impl DatasetSplit {
    /// Pair images with labels. Fails when the counts differ.
    pub fn new(images: Vec<Image>, labels: Vec<Label>) -> Result<Self> {
        ensure!(
            images.len() == labels.len(),
            "split has {} images but {} labels",
            images.len(),
            labels.len()
        );
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Iterate (image, label) pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&Image, Label)> {
        self.images.iter().zip(self.labels.iter().copied())
    }

    /// Keep only the first `n` pairs
    pub fn truncate(&mut self, n: usize) {
        self.images.truncate(n);
        self.labels.truncate(n);
    }
}

#[cfg(test)]
impl DatasetSplit {
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}
