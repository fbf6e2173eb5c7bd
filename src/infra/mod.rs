// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting file and process concerns of a training run:
//
//   checkpoint.rs  — model.<epoch>.ckpt weights and the
//                    config.json snapshot in the run directory
//
//   vocab_store.rs — loads the vocabulary file or builds it
//                    from the training corpus
//
//   metrics.rs     — per-epoch validation metrics CSV
//
//   outputs.rs     — decoded inputs / preds / golds / auxs
//
//   logging.rs     — console + train_log tracing setup

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary file loading and building
pub mod vocab_store;

/// Validation metrics CSV logger
pub mod metrics;

/// Per-epoch decoded output files
pub mod outputs;

/// tracing subscriber setup
pub mod logging;
