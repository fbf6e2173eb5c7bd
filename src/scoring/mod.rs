// ============================================================
// Layer 3 — Scoring (metric library)
// ============================================================
// Pure functions over tokenised sequences used to pick the best
// checkpoint and to report decode quality:
//
//   bleu.rs             — corpus BLEU-4 with brevity penalty
//   edit_distance.rs    — token-level Levenshtein, corpus mean
//   precision_recall.rs — content introduction / retention
//
// None of these functions fail: degenerate inputs map to 0.

pub mod bleu;
pub mod edit_distance;
pub mod precision_recall;

pub use bleu::{bleu, bleu_stats, get_bleu};
pub use edit_distance::{get_edit_distance, levenshtein};
pub use precision_recall::{average, get_precisions_recalls, precision_recall};
