// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss, decoding and optimisation code lives here.
//
// What's in this layer:
//
//   model.rs      — Transformer encoder-decoder with an optional
//                   attribute embedding (delete) or attribute
//                   encoder (delete_retrieve) on the encoder side
//
//   loss.rs       — Cross entropy with pad targets weighted 0
//
//   decoder.rs    — Greedy autoregressive decoding
//
//   optim.rs      — Adadelta, next to Burn's Adam and SGD
//
//   clip.rs       — Gradient clipping by the joint norm of all
//                   parameters
//
//   evaluator.rs  — Teacher-forced dev loss, full decode with
//                   BLEU / edit distance / precision / recall,
//                   and retrieval-based validation
//
//   trainer.rs    — Epoch loop, validation and best-only
//                   checkpointing
//
//   inferencer.rs — Loads a checkpoint and scores a corpus pair
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Li et al. (2018) Delete, Retrieve, Generate

/// Encoder-decoder architecture
pub mod model;

/// Pad-masked cross entropy
pub mod loss;

/// Greedy decoding
pub mod decoder;

/// Adadelta optimiser
pub mod optim;

/// Global gradient-norm clipping
pub mod clip;

/// Validation and inference metrics
pub mod evaluator;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint evaluation outside training
pub mod inferencer;
