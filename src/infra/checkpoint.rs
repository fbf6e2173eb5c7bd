// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights inside the run directory.
//
// File layout:
//   <working_dir>/
//     model.<epoch>.ckpt   ← weights (at most one is kept)
//     config.json          ← run config, written once
//
// Weights are serialised with Burn's NamedMpkBytesRecorder at
// full precision and written by us, so the file name is exactly
// model.<epoch>.ckpt with no extension appended by the recorder.
//
// Keeping only the best checkpoint:
//   replace_best() removes every model.* file before writing
//   the new one.

use anyhow::{anyhow, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::config::RunConfig;

pub const CHECKPOINT_PREFIX: &str = "model.";
pub const CHECKPOINT_SUFFIX: &str = ".ckpt";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the run directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{CHECKPOINT_PREFIX}{epoch}{CHECKPOINT_SUFFIX}"))
    }

    /// Write `model` as model.<epoch>.ckpt.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<PathBuf> {
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let bytes = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
            .map_err(|e| anyhow!("Failed to serialise checkpoint for epoch {epoch}: {e:?}"))?;

        let path = self.checkpoint_path(epoch);
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(path)
    }

    /// Delete every previous model.* file, then save.
    pub fn replace_best<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<PathBuf> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_model = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(CHECKPOINT_PREFIX));
            if is_model && path.is_file() {
                fs::remove_file(&path)
                    .with_context(|| format!("Cannot remove old checkpoint '{}'", path.display()))?;
            }
        }
        self.save_model::<B, M>(model, epoch)
    }

    /// All model.<epoch>.ckpt files, oldest epoch first.
    pub fn checkpoints(&self) -> Result<Vec<(usize, PathBuf)>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let epoch = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_checkpoint_name);
            if let Some(epoch) = epoch {
                found.push((epoch, path));
            }
        }
        found.sort();
        Ok(found)
    }

    pub fn latest_checkpoint(&self) -> Result<Option<(usize, PathBuf)>> {
        Ok(self.checkpoints()?.pop())
    }

    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        path:   &Path,
        device: &B::Device,
    ) -> Result<M> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let record = Recorder::<B>::load(&recorder, bytes, device)
            .map_err(|e| anyhow!("Cannot load checkpoint '{}': {e:?}", path.display()))?;
        Ok(model.load_record(record))
    }

    /// Resume from the newest checkpoint, if any.
    /// Returns the model and the epoch to start training at.
    pub fn attempt_load_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        device: &B::Device,
    ) -> Result<(M, usize)> {
        match self.latest_checkpoint()? {
            Some((epoch, path)) => {
                tracing::info!("Resuming from checkpoint '{}'", path.display());
                let model = self.load_model::<B, M>(model, &path, device)?;
                Ok((model, epoch + 1))
            }
            None => {
                tracing::info!("No checkpoint found in '{}'; starting fresh", self.dir.display());
                Ok((model, 0))
            }
        }
    }

    /// Snapshot the run config as config.json unless one already exists.
    /// Returns whether a file was written.
    pub fn save_config(&self, cfg: &RunConfig) -> Result<bool> {
        let path = self.dir.join("config.json");
        if path.exists() {
            return Ok(false);
        }
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(true)
    }
}

fn parse_checkpoint_name(name: &str) -> Option<usize> {
    name.strip_prefix(CHECKPOINT_PREFIX)?
        .strip_suffix(CHECKPOINT_SUFFIX)?
        .parse()
        .ok()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::NdArray,
        nn::{Linear, LinearConfig},
    };

    type TestBackend = NdArray;

    fn linear() -> Linear<TestBackend> {
        LinearConfig::new(3, 2).init(&Default::default())
    }

    #[test]
    fn test_parse_checkpoint_name() {
        assert_eq!(parse_checkpoint_name("model.12.ckpt"), Some(12));
        assert_eq!(parse_checkpoint_name("model.x.ckpt"), None);
        assert_eq!(parse_checkpoint_name("preds.3"), None);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let a    = linear();
        let path = ckpt.save_model::<TestBackend, _>(&a, 3).unwrap();
        assert_eq!(path.file_name().unwrap(), "model.3.ckpt");

        let b = ckpt.load_model::<TestBackend, _>(linear(), &path, &Default::default()).unwrap();
        let wa: Vec<f32> = a.weight.val().into_data().to_vec().unwrap();
        let wb: Vec<f32> = b.weight.val().into_data().to_vec().unwrap();
        assert_eq!(wa, wb);
    }

    #[test]
    fn test_replace_best_keeps_one_file() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let m    = linear();
        ckpt.replace_best::<TestBackend, _>(&m, 1).unwrap();
        ckpt.replace_best::<TestBackend, _>(&m, 4).unwrap();
        let epochs: Vec<usize> = ckpt.checkpoints().unwrap().into_iter().map(|(e, _)| e).collect();
        assert_eq!(epochs, vec![4]);
    }

    #[test]
    fn test_attempt_load_resumes_after_checkpoint_epoch() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        let (_, start) = ckpt.attempt_load_model::<TestBackend, _>(linear(), &Default::default()).unwrap();
        assert_eq!(start, 0);

        ckpt.save_model::<TestBackend, _>(&linear(), 2).unwrap();
        ckpt.save_model::<TestBackend, _>(&linear(), 10).unwrap();
        let (_, start) = ckpt.attempt_load_model::<TestBackend, _>(linear(), &Default::default()).unwrap();
        assert_eq!(start, 11);
    }
}
