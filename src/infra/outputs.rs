// ============================================================
// Layer 6 — Decoded Output Files
// ============================================================
// Per-epoch text artefacts in the run directory, one example
// per line in corpus order:
//
//   inputs.<tag>  preds.<tag>  golds.<tag>  auxs.<tag>
//
// <tag> is the epoch number during training and "eval" for a
// standalone evaluation. The retrieval path only writes
// preds.<tag>, one source example per line with its decoded
// neighbour candidates joined by " ||| ".

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::evaluator::InferenceReport;

pub const CANDIDATE_SEPARATOR: &str = " ||| ";

pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, kind: &str, tag: &str) -> PathBuf {
        self.dir.join(format!("{kind}.{tag}"))
    }

    /// inputs / preds / golds / auxs for one inference pass.
    pub fn write_report(&self, tag: &str, report: &InferenceReport) -> Result<()> {
        self.write_lines(&self.path("auxs", tag), &report.auxs)?;
        self.write_lines(&self.path("inputs", tag), &report.inputs)?;
        self.write_lines(&self.path("preds", tag), &report.preds)?;
        self.write_lines(&self.path("golds", tag), &report.golds)?;
        Ok(())
    }

    /// preds.<tag> for the retrieval path.
    pub fn write_candidates(&self, tag: &str, decoded: &[Vec<String>]) -> Result<()> {
        let lines: Vec<String> = decoded.iter().map(|c| c.join(CANDIDATE_SEPARATOR)).collect();
        self.write_lines(&self.path("preds", tag), &lines)
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        fs::write(path, lines.join("\n") + "\n")
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote {} lines to '{}'", lines.len(), path.display());
        Ok(())
    }
}
