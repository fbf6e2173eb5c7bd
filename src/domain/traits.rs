// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================

use crate::domain::records::RetrievalNeighbor;

// ─── NeighborIndex ────────────────────────────────────────────────────────────
/// Any index that can rank target-domain examples by similarity
/// to a query example.
///
/// Implementations:
///   - CorpusSearcher → TF-IDF cosine over content tokens
pub trait NeighborIndex {
    /// Neighbours of query example `index`, most similar first.
    fn most_similar(&self, index: usize) -> Vec<RetrievalNeighbor>;
}
