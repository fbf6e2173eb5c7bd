// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load and validate the run config  (Layer 2 - config)
//   Step 2: Prepare the run directory + logs  (Layer 6 - infra)
//   Step 3: Load / build the vocabulary       (Layer 6 - infra)
//   Step 4: Split the training corpus         (Layer 4 - data)
//   Step 5: Run training loop                 (Layer 5 - ml)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf, sync::Arc};

use crate::application::config::RunConfig;
use crate::data::corpus::{read_lines, AttributeVocab, CorpusLoader};
use crate::domain::{model_type::ModelType, vocab::Vocabulary};
use crate::infra::{
    checkpoint::CheckpointManager,
    logging::init_tracing,
    metrics::MetricsLogger,
    outputs::OutputWriter,
    vocab_store::VocabStore,
};
use crate::ml::trainer::{run_training, RunServices, TrainingData};

pub const TRAIN_LOG: &str = "train_log";

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config_path: PathBuf,
    bleu:        bool,
}

impl TrainUseCase {
    pub fn new(config_path: impl Into<PathBuf>, bleu: bool) -> Self {
        Self { config_path: config_path.into(), bleu }
    }

    pub fn execute(&self) -> Result<()> {
        // ── Step 1: Config ───────────────────────────────────────────────────
        let cfg = RunConfig::load(&self.config_path)?;

        // ── Step 2: Run directory ────────────────────────────────────────────
        let work_dir = &cfg.data.working_dir;
        fs::create_dir_all(work_dir)
            .with_context(|| format!("Cannot create working dir '{}'", work_dir.display()))?;
        init_tracing(Some(&work_dir.join(TRAIN_LOG)))?;

        let checkpoints = CheckpointManager::new(work_dir)?;
        if !checkpoints.save_config(&cfg)? {
            tracing::info!("Keeping existing '{}'", cfg.snapshot_path().display());
        }

        // ── Step 3 + 4: Vocabulary and corpus ────────────────────────────────
        tracing::info!("Reading data from '{}'", cfg.data.src.display());
        let lines  = read_lines(&cfg.data.src)?;
        let vocab  = VocabStore::new(&cfg.data.vocab).load_or_build(&lines)?;
        tracing::info!("Vocabulary: {} tokens", vocab.len());
        let loader = corpus_loader(&cfg, Arc::new(vocab))?;
        let train  = loader.train_corpus(lines, cfg.model.model_type == ModelType::DeleteRetrieve);

        let data = TrainingData {
            train,
            loader,
            src_dev: cfg.data.src_dev.clone(),
            tgt_dev: cfg.data.tgt_dev.clone(),
        };
        let services = RunServices {
            checkpoints,
            metrics: MetricsLogger::new(work_dir)?,
            outputs: OutputWriter::new(work_dir),
        };

        // ── Step 5: Training loop (Layer 5) ──────────────────────────────────
        let state = run_training(&cfg, self.bleu, &data, &services)?;
        match state.checkpoint_epoch {
            Some(epoch) => tracing::info!(
                "Best checkpoint: '{}' (metric {:.4})",
                services.checkpoints.checkpoint_path(epoch).display(),
                state.best_metric,
            ),
            None => tracing::warn!("No checkpoint was written during this run"),
        }
        Ok(())
    }
}

/// Loader sharing one vocabulary and the configured attribute markers.
pub fn corpus_loader(cfg: &RunConfig, vocab: Arc<Vocabulary>) -> Result<CorpusLoader> {
    let attributes = AttributeVocab::load(&cfg.data.attribute_vocab)?;
    tracing::info!("Attribute vocabulary: {} markers", attributes.len());
    Ok(CorpusLoader::new(
        vocab,
        attributes,
        cfg.data.ngram_attributes,
        cfg.data.num_neighbors,
    ))
}
