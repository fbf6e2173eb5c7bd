// ============================================================
// Scoring — Edit Distance
// ============================================================

/// Token-level Levenshtein distance (unit insert/delete/substitute).
pub fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur  = vec![0; b.len() + 1];

    for (i, x) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(x != y);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Mean edit distance over hypothesis/reference pairs (not length normalised).
pub fn get_edit_distance<T: PartialEq>(hypotheses: &[Vec<T>], references: &[Vec<T>]) -> f64 {
    if hypotheses.is_empty() {
        return 0.0;
    }
    let total: usize = hypotheses
        .iter()
        .zip(references)
        .map(|(hyp, reference)| levenshtein(hyp, reference))
        .sum();
    total as f64 / hypotheses.len() as f64
}
