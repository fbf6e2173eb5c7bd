// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Typed view of the JSON run configuration.
//
//   {
//     "data":     { "src": .., "src_dev": .., "tgt_dev": .., "vocab": ..,
//                   "attribute_vocab": .., "batch_size": 256, "max_len": 50,
//                   "working_dir": "runs/yelp" },
//     "model":    { "model_type": "delete_retrieve", "emb_dim": 128, .. },
//     "training": { "optimizer": "adam", "learning_rate": 0.0003,
//                   "max_norm": 3.0, "epochs": 70, "random_seed": 1,
//                   "batches_per_report": 200 }
//   }
//
// Unknown enum values (optimizer, model_type) are rejected while
// deserialising, so a bad run fails before any data is read.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::model_type::ModelType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub data:     DataConfig,
    pub model:    ModelConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Training corpus (one sentence per line)
    pub src:             PathBuf,
    pub src_dev:         PathBuf,
    pub tgt_dev:         PathBuf,
    #[serde(default)]
    pub src_test:        Option<PathBuf>,
    #[serde(default)]
    pub tgt_test:        Option<PathBuf>,
    /// Vocabulary file; built from `src` when missing
    pub vocab:           PathBuf,
    /// Attribute markers, one per line with an optional tab-separated score
    pub attribute_vocab: PathBuf,
    #[serde(default)]
    pub ngram_attributes: bool,
    pub batch_size:      usize,
    pub max_len:         usize,
    pub working_dir:     PathBuf,
    #[serde(default = "default_num_neighbors")]
    pub num_neighbors:   usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_type:     ModelType,
    #[serde(default = "default_emb_dim")]
    pub emb_dim:        usize,
    #[serde(default = "default_num_heads")]
    pub num_heads:      usize,
    #[serde(default = "default_num_layers")]
    pub num_layers:     usize,
    #[serde(default = "default_ff_dim")]
    pub ff_dim:         usize,
    #[serde(default = "default_dropout")]
    pub dropout:        f64,
    #[serde(default = "default_num_attributes")]
    pub num_attributes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
    Adadelta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub optimizer:          OptimizerKind,
    pub learning_rate:      f64,
    pub max_norm:           f64,
    pub epochs:             usize,
    pub random_seed:        u64,
    pub batches_per_report: usize,
    #[serde(default = "default_bleu_start_epoch")]
    pub bleu_start_epoch:   usize,
}

fn default_num_neighbors()    -> usize { 10 }
fn default_emb_dim()          -> usize { 128 }
fn default_num_heads()        -> usize { 4 }
fn default_num_layers()       -> usize { 2 }
fn default_ff_dim()           -> usize { 512 }
fn default_dropout()          -> f64   { 0.2 }
fn default_num_attributes()   -> usize { 2 }
fn default_bleu_start_epoch() -> usize { 1 }

impl RunConfig {
    /// Read, parse and validate a JSON run configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: RunConfig = serde_json::from_str(json)
            .context("unsupported configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.batch_size == 0 {
            bail!("unsupported configuration: data.batch_size must be > 0");
        }
        if self.data.max_len == 0 {
            bail!("unsupported configuration: data.max_len must be > 0");
        }
        if self.training.batches_per_report == 0 {
            bail!("unsupported configuration: training.batches_per_report must be > 0");
        }
        if self.model.num_heads == 0 || self.model.emb_dim % self.model.num_heads != 0 {
            bail!(
                "unsupported configuration: model.emb_dim ({}) must be divisible by model.num_heads ({})",
                self.model.emb_dim,
                self.model.num_heads
            );
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            bail!("unsupported configuration: model.dropout must be in [0, 1)");
        }
        if self.model.model_type == ModelType::Delete && self.model.num_attributes < 2 {
            bail!("unsupported configuration: delete models need at least 2 attributes");
        }
        Ok(())
    }

    /// `<working_dir>/config.json`
    pub fn snapshot_path(&self) -> PathBuf {
        self.data.working_dir.join("config.json")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": {
            "src": "data/train.txt", "src_dev": "data/dev.0", "tgt_dev": "data/dev.1",
            "vocab": "data/vocab", "attribute_vocab": "data/attrs",
            "batch_size": 4, "max_len": 10, "working_dir": "runs/test"
        },
        "model": { "model_type": "delete" },
        "training": {
            "optimizer": "adam", "learning_rate": 0.001, "max_norm": 3.0,
            "epochs": 2, "random_seed": 7, "batches_per_report": 1
        }
    }"#;

    #[test]
    fn test_defaults_are_filled() {
        let cfg = RunConfig::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.model.model_type, ModelType::Delete);
        assert_eq!(cfg.model.emb_dim, 128);
        assert_eq!(cfg.data.num_neighbors, 10);
        assert_eq!(cfg.training.bleu_start_epoch, 1);
        assert_eq!(cfg.training.optimizer, OptimizerKind::Adam);
        assert!(cfg.data.src_test.is_none());
        assert_eq!(cfg.snapshot_path(), PathBuf::from("runs/test/config.json"));
    }

    #[test]
    fn test_unknown_optimizer_fails_fast() {
        let json = SAMPLE.replace("\"adam\"", "\"rmsprop\"");
        let err  = RunConfig::from_json(&json).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported configuration"));
    }

    #[test]
    fn test_unknown_model_type_fails_fast() {
        let json = SAMPLE.replace("\"delete\"", "\"lstm\"");
        assert!(RunConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_missing_key_fails_fast() {
        let json = SAMPLE.replace("\"max_norm\": 3.0,", "");
        assert!(RunConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let json = SAMPLE.replace("\"batch_size\": 4", "\"batch_size\": 0");
        assert!(RunConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_heads_must_divide_embedding() {
        let json = SAMPLE.replace(
            "\"model_type\": \"delete\"",
            "\"model_type\": \"delete\", \"emb_dim\": 10, \"num_heads\": 4",
        );
        assert!(RunConfig::from_json(&json).is_err());
    }
}
