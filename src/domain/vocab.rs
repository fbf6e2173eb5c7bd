// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Dense bidirectional mapping between tokens and integer ids.
//
// The first four ids are always reserved, in this order:
//   0 → <unk>   1 → <pad>   2 → <s>   3 → </s>
//
// Two different fallback ids exist for tokens that are not in
// the vocabulary:
//   - UNK_FALLBACK (the <unk> id), used when encoding content/targets
//   - RAW_AUX_FALLBACK_ID (literal 1), used only when encoding
//     an auxiliary sequence
// Note that with the reserved
// layout above the literal 1 is the <pad> id.

use anyhow::{bail, Result};
use std::collections::HashMap;

pub const UNK_TOKEN:   &str = "<unk>";
pub const PAD_TOKEN:   &str = "<pad>";
pub const START_TOKEN: &str = "<s>";
pub const END_TOKEN:   &str = "</s>";

/// Stand-in for an auxiliary sequence that would otherwise be empty
pub const EMPTY_TOKEN: &str = "<empty>";

/// Reserved tokens in id order
pub const RESERVED_TOKENS: [&str; 4] = [UNK_TOKEN, PAD_TOKEN, START_TOKEN, END_TOKEN];

/// Fallback id for unknown tokens in content and target encoding
pub const UNK_FALLBACK: usize = 0;

/// Fallback id for unknown tokens in the auxiliary ("none" tag) encoding path
pub const RAW_AUX_FALLBACK_ID: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tok2id: HashMap<String, usize>,
    id2tok: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from tokens listed in id order.
    ///
    /// The list must start with the reserved tokens. Duplicates are
    /// skipped and `<empty>` is appended when missing.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tok2id = HashMap::new();
        let mut id2tok = Vec::new();

        for token in tokens {
            let token = token.into();
            if tok2id.contains_key(&token) {
                tracing::warn!("Duplicate vocabulary entry '{}' ignored", token);
                continue;
            }
            tok2id.insert(token.clone(), id2tok.len());
            id2tok.push(token);
        }

        for (expected_id, expected) in RESERVED_TOKENS.iter().enumerate() {
            if id2tok.get(expected_id).map(String::as_str) != Some(*expected) {
                bail!(
                    "vocabulary must start with {:?}; found {:?} at id {}",
                    RESERVED_TOKENS,
                    id2tok.get(expected_id),
                    expected_id
                );
            }
        }

        if !tok2id.contains_key(EMPTY_TOKEN) {
            tok2id.insert(EMPTY_TOKEN.to_string(), id2tok.len());
            id2tok.push(EMPTY_TOKEN.to_string());
        }

        Ok(Self { tok2id, id2tok })
    }

    pub fn len(&self) -> usize {
        self.id2tok.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2tok.is_empty()
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.tok2id.get(token).copied()
    }

    /// Lookup with the named `<unk>` fallback
    pub fn id_or_unk(&self, token: &str) -> usize {
        self.id(token).unwrap_or_else(|| self.unk_id())
    }

    /// Lookup with the raw auxiliary fallback
    pub fn id_or_raw_fallback(&self, token: &str) -> usize {
        self.id(token).unwrap_or(RAW_AUX_FALLBACK_ID)
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.id2tok.get(id).map(String::as_str)
    }

    /// Out-of-range ids render as `<unk>`
    pub fn token_or_unk(&self, id: usize) -> &str {
        self.token(id).unwrap_or(UNK_TOKEN)
    }

    pub fn tokens(&self) -> &[String] {
        &self.id2tok
    }

    pub fn unk_id(&self) -> usize { UNK_FALLBACK }
    pub fn pad_id(&self) -> usize { 1 }
    pub fn start_id(&self) -> usize { 2 }
    pub fn end_id(&self) -> usize { 3 }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn small_vocab() -> Vocabulary {
        Vocabulary::from_tokens(["<unk>", "<pad>", "<s>", "</s>", "good", "bad"]).unwrap()
    }

    #[test]
    fn test_reserved_ids() {
        let v = small_vocab();
        assert_eq!(v.id(UNK_TOKEN),   Some(v.unk_id()));
        assert_eq!(v.id(PAD_TOKEN),   Some(v.pad_id()));
        assert_eq!(v.id(START_TOKEN), Some(v.start_id()));
        assert_eq!(v.id(END_TOKEN),   Some(v.end_id()));
    }

    #[test]
    fn test_empty_token_is_appended() {
        let v = small_vocab();
        assert_eq!(v.id(EMPTY_TOKEN), Some(6));
        assert_eq!(v.len(), 7);
    }

    #[test]
    fn test_fallbacks_differ() {
        let v = small_vocab();
        assert_eq!(v.id_or_unk("missing"), 0);
        assert_eq!(v.id_or_raw_fallback("missing"), RAW_AUX_FALLBACK_ID);
        assert_eq!(v.id_or_raw_fallback("good"), 4);
    }

    #[test]
    fn test_rejects_missing_reserved_prefix() {
        assert!(Vocabulary::from_tokens(["<pad>", "<unk>", "<s>", "</s>"]).is_err());
        assert!(Vocabulary::from_tokens(["<unk>", "<pad>"]).is_err());
    }

    #[test]
    fn test_duplicates_are_skipped() {
        let v = Vocabulary::from_tokens(["<unk>", "<pad>", "<s>", "</s>", "a", "a", "b"]).unwrap();
        assert_eq!(v.id("b"), Some(5));
    }
}
