// ============================================================
// Scoring — Content Precision / Recall
// ============================================================
// Per (source, reference, prediction) triple, over token sets:
//
//   tgt_unique = reference − source
//   src_unique = source − reference
//
//   TP = |prediction ∩ tgt_unique|        novel words correctly introduced
//   FP = |prediction − source − reference| words from neither side
//   FN = |prediction ∩ src_unique|        source-only words kept
//
// EPSILON keeps both ratios defined when a denominator is empty.

use std::collections::HashSet;
use std::hash::Hash;

pub const EPSILON: f64 = 0.001;

pub fn precision_recall<T: Hash + Eq>(src: &[T], tgt: &[T], pred: &[T]) -> (f64, f64) {
    let src_set:  HashSet<&T> = src.iter().collect();
    let tgt_set:  HashSet<&T> = tgt.iter().collect();
    let pred_set: HashSet<&T> = pred.iter().collect();

    let tp = pred_set.iter().filter(|w| tgt_set.contains(*w) && !src_set.contains(*w)).count();
    let fn_ = pred_set.iter().filter(|w| src_set.contains(*w) && !tgt_set.contains(*w)).count();
    let fp = pred_set.iter().filter(|w| !src_set.contains(*w) && !tgt_set.contains(*w)).count();

    let precision = tp as f64 / (tp as f64 + fp as f64 + EPSILON);
    let recall    = tp as f64 / (tp as f64 + fn_ as f64 + EPSILON);
    (precision, recall)
}

/// Per-example precisions and recalls, in corpus order.
pub fn get_precisions_recalls<T: Hash + Eq>(
    inputs:        &[Vec<T>],
    preds:         &[Vec<T>],
    ground_truths: &[Vec<T>],
) -> (Vec<f64>, Vec<f64>) {
    inputs
        .iter()
        .zip(ground_truths)
        .zip(preds)
        .map(|((src, tgt), pred)| precision_recall(src, tgt, pred))
        .unzip()
}

/// Arithmetic mean; 0 for an empty slice.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
