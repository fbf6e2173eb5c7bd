// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads trained weights and runs a full decode-and-score pass on
// a paired corpus (dev or test), outside the training loop.
use anyhow::{anyhow, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::path::Path;

use crate::application::config::RunConfig;
use crate::data::{batcher::MinibatchBatcher, corpus::Corpus};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::evaluator::{inference_metrics, EvalSettings, InferenceReport};
use crate::ml::model::{StyleTransferConfig, StyleTransferModel};
use burn::prelude::*;

type InferBackend = burn::backend::Wgpu;

pub struct Inferencer<B: Backend> {
    model:    StyleTransferModel<B>,
    settings: EvalSettings,
    batcher:  MinibatchBatcher<B>,
    seed:     u64,
}

impl Inferencer<InferBackend> {
    /// Model on the default WGPU device, weights from `checkpoint`
    /// or else the newest checkpoint in the run directory.
    pub fn from_checkpoint(
        cfg:          &RunConfig,
        vocab_size:   usize,
        ckpt_manager: &CheckpointManager,
        checkpoint:   Option<&Path>,
    ) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        Self::load(cfg, vocab_size, ckpt_manager, checkpoint, &device)
    }
}

impl<B: Backend> Inferencer<B> {
    pub fn load(
        cfg:          &RunConfig,
        vocab_size:   usize,
        ckpt_manager: &CheckpointManager,
        checkpoint:   Option<&Path>,
        device:       &B::Device,
    ) -> Result<Self> {
        let path = match checkpoint {
            Some(p) => p.to_path_buf(),
            None => ckpt_manager
                .latest_checkpoint()?
                .map(|(_, p)| p)
                .ok_or_else(|| {
                    anyhow!("No checkpoint found in '{}'. Train a model first.", ckpt_manager.dir().display())
                })?,
        };

        let model_cfg = StyleTransferConfig::from_run(cfg, vocab_size).with_dropout(0.0);
        let model: StyleTransferModel<B> = model_cfg.init(device);
        let model = ckpt_manager.load_model::<B, _>(model, &path, device)?;
        tracing::info!("Model loaded from checkpoint '{}'", path.display());

        Ok(Self {
            model,
            settings: EvalSettings {
                batch_size: cfg.data.batch_size,
                max_len:    cfg.data.max_len,
                model_type: cfg.model.model_type,
            },
            batcher: MinibatchBatcher::new(device.clone()),
            seed:    cfg.training.random_seed,
        })
    }

    /// Decode `src` and score the output against `tgt`.
    pub fn evaluate(&self, src: &Corpus, tgt: &Corpus) -> InferenceReport {
        let mut rng = StdRng::seed_from_u64(self.seed);
        inference_metrics(&self.model, src, tgt, self.settings, &self.batcher, &mut rng)
    }
}
