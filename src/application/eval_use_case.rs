// ============================================================
// Layer 2 — Eval Use Case
// ============================================================
// Scores a trained checkpoint on the dev split (or the test
// split with --test) and writes inputs/preds/golds/auxs.eval.

use anyhow::{anyhow, Result};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::application::{config::RunConfig, train_use_case::corpus_loader};
use crate::infra::{
    checkpoint::CheckpointManager,
    logging::init_tracing,
    outputs::OutputWriter,
    vocab_store::VocabStore,
};
use crate::ml::{evaluator::InferenceReport, inferencer::Inferencer};

pub const EVAL_TAG: &str = "eval";

pub struct EvalUseCase {
    config_path: PathBuf,
    checkpoint:  Option<PathBuf>,
    test:        bool,
}

impl EvalUseCase {
    pub fn new(config_path: impl Into<PathBuf>, checkpoint: Option<PathBuf>, test: bool) -> Self {
        Self { config_path: config_path.into(), checkpoint, test }
    }

    pub fn execute(&self) -> Result<InferenceReport> {
        init_tracing(None)?;
        let cfg = RunConfig::load(&self.config_path)?;
        let (src_path, tgt_path) = split_paths(&cfg, self.test)?;

        let vocab  = Arc::new(VocabStore::new(&cfg.data.vocab).load()?);
        let loader = corpus_loader(&cfg, vocab.clone())?;
        tracing::info!("Reading '{}' / '{}'", src_path.display(), tgt_path.display());
        let (src, tgt) = loader.load_pair(src_path, tgt_path)?;

        let work_dir   = &cfg.data.working_dir;
        let ckpt       = CheckpointManager::new(work_dir)?;
        let inferencer = Inferencer::from_checkpoint(&cfg, vocab.len(), &ckpt, self.checkpoint.as_deref())?;

        let report = inferencer.evaluate(&src, &tgt);
        OutputWriter::new(work_dir).write_report(EVAL_TAG, &report)?;

        tracing::info!("eval_precision: {:.4}", report.precision);
        tracing::info!("eval_recall: {:.4}", report.recall);
        tracing::info!("eval_edit_distance: {:.4}", report.edit_distance);
        tracing::info!("eval_bleu: {:.4}", report.bleu);
        Ok(report)
    }
}

/// (source, target) files of the requested split.
fn split_paths(cfg: &RunConfig, test: bool) -> Result<(&Path, &Path)> {
    if !test {
        return Ok((&cfg.data.src_dev, &cfg.data.tgt_dev));
    }
    match (&cfg.data.src_test, &cfg.data.tgt_test) {
        (Some(src), Some(tgt)) => Ok((src, tgt)),
        _ => Err(anyhow!("--test needs data.src_test and data.tgt_test in the config")),
    }
}
