// ============================================================
// Layer 4 — Corpus Searcher (retrieval index)
// ============================================================
// Ranks key-corpus examples by TF-IDF cosine similarity to an
// example of the query corpus.
//
//   query corpus → content strings we search *from*
//   key corpus   → content strings we search *over*
//   value corpus → attribute strings returned with each key
//
// idf is the smoothed form ln((1 + n) / (1 + df)) + 1 computed
// over the key corpus. Query terms never seen in a key are
// dropped. Vectors are L2-normalised so the dot product is the
// cosine similarity.

use std::collections::HashMap;

use crate::domain::records::RetrievalNeighbor;
use crate::domain::traits::NeighborIndex;

type SparseVector = HashMap<String, f64>;

pub struct CorpusSearcher {
    queries:     Vec<String>,
    keys:        Vec<String>,
    values:      Vec<String>,
    query_vecs:  Vec<SparseVector>,
    key_vecs:    Vec<SparseVector>,
    top_n:       usize,
}

impl CorpusSearcher {
    pub fn new(queries: Vec<String>, keys: Vec<String>, values: Vec<String>, top_n: usize) -> Self {
        assert_eq!(keys.len(), values.len(), "every key needs a value");

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for key in &keys {
            let mut seen: Vec<&str> = key.split_whitespace().collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
        let n   = keys.len() as f64;
        let idf: HashMap<String, f64> = doc_freq
            .into_iter()
            .map(|(term, df)| (term.to_string(), ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0))
            .collect();

        let query_vecs = queries.iter().map(|q| tfidf(q, &idf)).collect();
        let key_vecs   = keys.iter().map(|k| tfidf(k, &idf)).collect();

        tracing::debug!(
            "Built retrieval index: {} queries, {} keys, {} terms",
            queries.len(),
            keys.len(),
            idf.len()
        );

        Self { queries, keys, values, query_vecs, key_vecs, top_n }
    }
}

fn tfidf(text: &str, idf: &HashMap<String, f64>) -> SparseVector {
    let mut vec = SparseVector::new();
    for term in text.split_whitespace() {
        if let Some(&weight) = idf.get(term) {
            *vec.entry(term.to_string()).or_insert(0.0) += weight;
        }
    }
    let norm = vec.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        vec.values_mut().for_each(|w| *w /= norm);
    }
    vec
}

fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

impl NeighborIndex for CorpusSearcher {
    /// Out-of-range query indices have no neighbours.
    fn most_similar(&self, index: usize) -> Vec<RetrievalNeighbor> {
        let Some(query) = self.query_vecs.get(index) else {
            return Vec::new();
        };

        let mut scored: Vec<(usize, f64)> = self
            .key_vecs
            .iter()
            .enumerate()
            .map(|(i, key)| (i, cosine(query, key)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.top_n);

        scored
            .into_iter()
            .map(|(i, score)| RetrievalNeighbor {
                source_content:   self.queries[index].clone(),
                target_content:   self.keys[i].clone(),
                target_attribute: self.values[i].clone(),
                target_index:     i,
                score,
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn searcher(top_n: usize) -> CorpusSearcher {
        CorpusSearcher::new(
            strings(&["the pasta sauce", "the staff"]),
            strings(&["the staff here", "pasta with sauce", "the parking lot"]),
            strings(&["friendly", "delicious", "huge"]),
            top_n,
        )
    }

    #[test]
    fn test_best_match_first() {
        let hits = searcher(3).most_similar(0);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].target_index, 1);
        assert_eq!(hits[0].target_attribute, "delicious");
        assert_eq!(hits[0].source_content, "the pasta sauce");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_top_n_limits_results() {
        let hits = searcher(1).most_similar(1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target_content, "the staff here");
    }

    #[test]
    fn test_identical_text_scores_one() {
        let s = CorpusSearcher::new(strings(&["a b"]), strings(&["a b"]), strings(&["x"]), 5);
        assert!((s.most_similar(0)[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_query() {
        assert!(searcher(3).most_similar(9).is_empty());
    }
}
