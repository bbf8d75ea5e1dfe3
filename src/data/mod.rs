// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw dataset bytes to tensor batches.
//
// The pipeline flows in this order:
//
//   IDX files / burn MNIST cache
//       │
//       ▼
//   Loader            → (train, test) DatasetSplits of raw images
//       │
//       ▼
//   Preprocessor      → [0,1] floats, channel dim, one-hot labels
//       │
//       ▼
//   Splitter          → training subset + validation tail
//       │
//       ▼
//   DigitDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   DigitBatcher      → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Dataset sources (burn download, local IDX files) and ground truth
pub mod loader;

/// Normalisation and one-hot encoding
pub mod preprocessor;

/// Implements Burn's Dataset trait for digit samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Splits training samples into train/validation subsets
pub mod splitter;
