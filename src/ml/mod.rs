// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The network itself and everything that runs it.
//
//   model.rs      — Sequential topology as layer records plus
//                   the builder that turns them into a burn
//                   Module (conv → pool → conv → pool →
//                   flatten → dense → dense/softmax)
//
//   trainer.rs    — The training loop: Adam, categorical
//                   cross-entropy, validation every epoch
//
//   evaluator.rs  — Loss/accuracy over a held-out split
//
//   inferencer.rs — Runs a trained model on single images
//
//   backend.rs    — Which burn backend the binary runs on
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

/// Backend type aliases
pub mod backend;

/// Layer records, model builder and the CNN module
pub mod model;

/// Full training loop with validation
pub mod trainer;

/// One-pass loss/accuracy over a split
pub mod evaluator;

/// Inference engine — predicts digits for preprocessed images
pub mod inferencer;
