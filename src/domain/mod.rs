// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe what the rewriting system
// works with: the vocabulary, the model variant, the records
// produced by a validation pass and the retrieval contract.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

/// Token ↔ id mapping with the reserved tokens
pub mod vocab;

/// seq2seq / delete / delete_retrieve model variants
pub mod model_type;

/// Evaluation records and retrieval neighbours
pub mod records;

/// Core abstractions (traits) that other layers implement
pub mod traits;
