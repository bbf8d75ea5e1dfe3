// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer wires the other layers together to accomplish
// one goal (a full training run, or inference on a folder of
// images).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No direct file parsing here (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Run / training / inference settings
pub mod config;

// Load → preprocess → train → evaluate → visualise → save
pub mod pipeline_use_case;

// Inference on external image files
pub mod predict_use_case;
