// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between whitespace-tokenised text files and
// device tensors.
//
//   corpus files
//       │
//       ▼
//   CorpusLoader      → data / content / attribute splits
//       │
//       ▼
//   CorpusSearcher    → TF-IDF neighbours for retrieval
//       │
//       ▼
//   minibatch()       → padded id rows + order permutation
//       │
//       ▼
//   MinibatchBatcher  → Burn tensors on the target device
//
// The codec (word2id / id2word) is the per-example contract
// shared by the retrieval validation path and decoding.

/// Per-example encoding and decoding of id rows
pub mod codec;

/// Corpus files, attribute vocabulary and content/attribute split
pub mod corpus;

/// TF-IDF nearest-neighbour index over content strings
pub mod retrieval;

/// Padded minibatches for each model type
pub mod minibatch;

/// Host rows → device tensors
pub mod batcher;
