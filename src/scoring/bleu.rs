// ============================================================
// Scoring — BLEU
// ============================================================
// Statistics per hypothesis/reference pair (10 numbers):
//   [hyp_len, ref_len, match_1, total_1, ..., match_4, total_4]
//
// match_n is the clipped n-gram overlap (multiset intersection),
// total_n the number of n-grams in the hypothesis. Corpus BLEU
// sums the statistics over all pairs before combining them.

use std::collections::HashMap;
use std::hash::Hash;

pub const MAX_ORDER: usize = 4;

pub type BleuStats = [f64; 2 + 2 * MAX_ORDER];

fn ngram_counts<T: Hash + Eq>(tokens: &[T], n: usize) -> HashMap<&[T], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

/// Sufficient statistics for one hypothesis/reference pair.
pub fn bleu_stats<T: Hash + Eq>(hypothesis: &[T], reference: &[T]) -> BleuStats {
    let mut stats = [0.0; 2 + 2 * MAX_ORDER];
    stats[0] = hypothesis.len() as f64;
    stats[1] = reference.len() as f64;

    for n in 1..=MAX_ORDER {
        let hyp_grams = ngram_counts(hypothesis, n);
        let ref_grams = ngram_counts(reference, n);

        let matched: usize = hyp_grams
            .iter()
            .map(|(gram, &count)| count.min(ref_grams.get(gram).copied().unwrap_or(0)))
            .sum();

        stats[2 * n]     = matched as f64;
        stats[2 * n + 1] = (hypothesis.len() + 1).saturating_sub(n) as f64;
    }
    stats
}

/// BLEU in [0, 1] from aggregated statistics.
///
/// Any zero statistic (empty hypothesis, no 4-gram match, ...)
/// makes the score exactly 0.
pub fn bleu(stats: &BleuStats) -> f64 {
    if stats.iter().any(|&x| x == 0.0) {
        return 0.0;
    }
    let (c, r) = (stats[0], stats[1]);
    let log_bleu_prec = (1..=MAX_ORDER)
        .map(|n| (stats[2 * n] / stats[2 * n + 1]).ln())
        .sum::<f64>()
        / MAX_ORDER as f64;
    ((1.0 - r / c).min(0.0) + log_bleu_prec).exp()
}

/// Corpus BLEU scaled to [0, 100].
pub fn get_bleu<T: Hash + Eq>(hypotheses: &[Vec<T>], references: &[Vec<T>]) -> f64 {
    let mut stats = [0.0; 2 + 2 * MAX_ORDER];
    for (hyp, reference) in hypotheses.iter().zip(references) {
        for (total, s) in stats.iter_mut().zip(bleu_stats(hyp, reference)) {
            *total += s;
        }
    }
    100.0 * bleu(&stats)
}
