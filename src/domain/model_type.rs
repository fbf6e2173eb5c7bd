use serde::{Deserialize, Serialize};
use std::fmt;

/// Which auxiliary signal conditions generation.
///
///   seq2seq         → no auxiliary input
///   delete          → a single attribute id per example
///   delete_retrieve → a sequence of (retrieved) attribute tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Seq2seq,
    Delete,
    DeleteRetrieve,
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Seq2seq        => "seq2seq",
            ModelType::Delete         => "delete",
            ModelType::DeleteRetrieve => "delete_retrieve",
        }
    }

    pub fn has_aux(&self) -> bool {
        !matches!(self, ModelType::Seq2seq)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_names_round_trip() {
        for name in ["seq2seq", "delete", "delete_retrieve"] {
            let parsed: ModelType = serde_json::from_str(&format!("\"{name}\"")).unwrap();
            assert_eq!(parsed.name(), name);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        assert!(serde_json::from_str::<ModelType>("\"transformer\"").is_err());
    }
}
