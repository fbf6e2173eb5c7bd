// ============================================================
// Layer 3 — Evaluation Records
// ============================================================

/// One decoded example, in original corpus order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRecord {
    pub input:      Vec<String>,
    pub prediction: Vec<String>,
    pub reference:  Vec<String>,
    pub aux:        Vec<String>,
}

/// A target-domain example returned by a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalNeighbor {
    /// Content of the query (source) example
    pub source_content: String,
    /// Content of the matched target example
    pub target_content: String,
    /// Attribute markers of the matched target example
    pub target_attribute: String,
    /// Index of the matched example in the target corpus
    pub target_index: usize,
    pub score: f64,
}
