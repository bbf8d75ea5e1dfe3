// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers. The application layer only talks
// to these traits, so a local IDX directory and burn's MNIST
// download are interchangeable, and the inference runner can
// be exercised with a stub instead of a trained network.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::image::{NormalizedImage, Prediction};
use crate::domain::split::DatasetSplit;

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Anything that can produce the labelled digit dataset.
///
/// Implementations:
///   - BurnMnistSource → burn's cached MNIST download
///   - IdxDirSource    → raw IDX files in a local directory
pub trait DatasetSource {
    /// Load the (train, test) splits. The two splits are disjoint.
    fn load(&self) -> Result<(DatasetSplit, DatasetSplit)>;
}

// ─── DigitRecognizer ──────────────────────────────────────────────────────────
/// Anything that can classify a single preprocessed image.
///
/// Implementations:
///   - Inferencer → runs the trained network
pub trait DigitRecognizer {
    fn recognize(&self, image: &NormalizedImage) -> Result<Prediction>;
}
