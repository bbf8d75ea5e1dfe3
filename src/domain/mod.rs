// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the system
// works with: digit images, labels, dataset splits and the
// predictions made about them.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Images, labels, one-hot vectors and predictions
pub mod image;

// Paired image/label collections
pub mod split;

// Expected digit per external inference image
pub mod ground_truth;

// Core abstractions (traits) that other layers implement
pub mod traits;
