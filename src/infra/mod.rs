// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// other layers:
//
//   archive.rs    — Saving and loading a trained model
//                   One gzip'd MessagePack file holding the
//                   architecture (as JSON) and all weights,
//                   written with Burn's NamedMpkGzFileRecorder.
//
//   metrics.rs    — Per-epoch training history
//                   Kept in memory for the charts and written
//                   to metrics.csv for later analysis.
//
//   visualizer.rs — PNG output
//                   Accuracy/loss curves and thumbnail grids
//                   of predictions.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Single-file model persistence
pub mod archive;

/// Training history and CSV logger
pub mod metrics;

/// Training curves and prediction grids as PNG
pub mod visualizer;
