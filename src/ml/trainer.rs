// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with per-epoch validation and best-only checkpoints.
//
//   for epoch in start..epochs:
//       if last epoch's metric > best:  keep only model.<epoch>.ckpt
//       for each minibatch:  forward → masked CE → backward
//                            → clip → optimiser step
//       validate on model.valid():
//           dev_loss  = teacher-forced loss on the dev source side
//           metric    = BLEU          (--bleu, from bleu_start_epoch)
//                     | retrieval loss (otherwise)
//
// The checkpoint decision is taken *before* an epoch trains, using
// the previous epoch's metric, so the saved weights carry the
// number of the epoch that follows the one that scored. The metric
// is always compared with `>`, also when it is a loss.
//
// Burn notes:
//   - Training runs on Autodiff<Wgpu>; model.valid() gives the
//     model on the inner backend with dropout switched off
//   - max_norm bounds the joint norm of all gradients
//     (clip_grad_norm) before every optimiser step

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{path::PathBuf, time::Instant};

use crate::application::config::{OptimizerKind, RunConfig};
use crate::data::batcher::MinibatchBatcher;
use crate::data::corpus::{Corpus, CorpusLoader};
use crate::data::minibatch::minibatch;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    outputs::OutputWriter,
};
use crate::ml::clip::clip_grad_norm;
use crate::ml::evaluator::{evaluate_lpp, evaluate_lpp_val, inference_metrics, EvalSettings};
use crate::ml::loss::{masked_cross_entropy, scalar};
use crate::ml::model::{RewriteModel, StyleTransferConfig, StyleTransferModel};
use crate::ml::optim::AdadeltaConfig;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Training corpus plus what is needed to (re)load the dev pair.
pub struct TrainingData {
    pub train:   Corpus,
    pub loader:  CorpusLoader,
    pub src_dev: PathBuf,
    pub tgt_dev: PathBuf,
}

/// Run-directory services used by the loop.
pub struct RunServices {
    pub checkpoints: CheckpointManager,
    pub metrics:     MetricsLogger,
    pub outputs:     OutputWriter,
}

// ─── TrainerState ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    NotStarted,
    TrainingEpoch(usize),
    Validating(usize),
    Checkpointed(usize),
    Done,
}

/// Everything the loop carries from one iteration to the next.
#[derive(Debug, Clone)]
pub struct TrainerState {
    pub phase:            TrainerPhase,
    pub best_metric:      f64,
    pub cur_metric:       f64,
    pub dev_loss:         f64,
    /// Epoch number of the checkpoint currently on disk
    pub checkpoint_epoch: Option<usize>,
    losses_since_report:  Vec<f64>,
    report_started:       Instant,
}

impl Default for TrainerState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainerState {
    pub fn new() -> Self {
        Self {
            phase:               TrainerPhase::NotStarted,
            best_metric:         0.0,
            cur_metric:          0.0,
            dev_loss:            0.0,
            checkpoint_epoch:    None,
            losses_since_report: Vec::new(),
            report_started:      Instant::now(),
        }
    }

    /// Run `save(epoch)` when the last validated metric beats the best.
    pub fn checkpoint_if_improved<F>(&mut self, epoch: usize, save: F) -> Result<bool>
    where
        F: FnOnce(usize) -> Result<()>,
    {
        if self.cur_metric > self.best_metric {
            save(epoch)?;
            self.best_metric      = self.cur_metric;
            self.checkpoint_epoch = Some(epoch);
            self.phase            = TrainerPhase::Checkpointed(epoch);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn begin_epoch(&mut self, epoch: usize) {
        self.phase = TrainerPhase::TrainingEpoch(epoch);
    }

    pub fn record_loss(&mut self, loss: f64) {
        self.losses_since_report.push(loss);
    }

    /// (words per second, mean loss) since the last report; resets the window.
    pub fn take_report(&mut self, examples: usize) -> (f64, f64) {
        let secs = self.report_started.elapsed().as_secs_f64().max(f64::EPSILON);
        let avg  = if self.losses_since_report.is_empty() {
            f64::NAN
        } else {
            self.losses_since_report.iter().sum::<f64>() / self.losses_since_report.len() as f64
        };
        self.losses_since_report.clear();
        self.report_started = Instant::now();
        (examples as f64 / secs, avg)
    }

    pub fn begin_validation(&mut self, epoch: usize) {
        self.phase = TrainerPhase::Validating(epoch);
    }

    pub fn finish_validation(&mut self, dev_loss: f64, metric: f64) {
        self.dev_loss   = dev_loss;
        self.cur_metric = metric;
    }

    pub fn finish(&mut self) {
        self.phase = TrainerPhase::Done;
    }
}

// ─── Entry points ─────────────────────────────────────────────────────────────
pub fn run_training(
    cfg:      &RunConfig,
    bleu:     bool,
    data:     &TrainingData,
    services: &RunServices,
) -> Result<TrainerState> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    fit::<TrainBackend>(cfg, bleu, data, services, &device)
}

/// Build (or resume) the model and train it with the configured optimiser.
pub fn fit<B: AutodiffBackend>(
    cfg:      &RunConfig,
    bleu:     bool,
    data:     &TrainingData,
    services: &RunServices,
    device:   &B::Device,
) -> Result<TrainerState> {
    B::seed(cfg.training.random_seed);

    let model_cfg = StyleTransferConfig::from_run(cfg, data.train.vocab.len());
    let model: StyleTransferModel<B> = model_cfg.init(device);
    tracing::info!("MODEL HAS {} params", model.num_params());

    let (model, start_epoch) = services.checkpoints.attempt_load_model::<B, _>(model, device)?;

    match cfg.training.optimizer {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new().with_epsilon(1e-8).init();
            train_loop(cfg, bleu, data, services, model, optim, start_epoch, device)
        }
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init();
            train_loop(cfg, bleu, data, services, model, optim, start_epoch, device)
        }
        OptimizerKind::Adadelta => {
            let optim = AdadeltaConfig::new().init();
            train_loop(cfg, bleu, data, services, model, optim, start_epoch, device)
        }
    }
}

/// backward → global-norm clip → optimiser step.
pub fn train_step<B, M, O>(model: M, optim: &mut O, loss: Tensor<B, 1>, lr: f64, max_norm: f64) -> M
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let mut grads = GradientsParams::from_grads(loss.backward(), &model);
    let norm = clip_grad_norm(&model, &mut grads, max_norm);
    if norm > max_norm {
        tracing::debug!("Clipped gradient norm {:.4} to {:.4}", norm, max_norm);
    }
    optim.step(lr, model, grads)
}

#[allow(clippy::too_many_arguments)]
fn train_loop<B, O>(
    cfg:         &RunConfig,
    bleu:        bool,
    data:        &TrainingData,
    services:    &RunServices,
    mut model:   StyleTransferModel<B>,
    mut optim:   O,
    start_epoch: usize,
    device:      &B::Device,
) -> Result<TrainerState>
where
    B: AutodiffBackend,
    O: Optimizer<StyleTransferModel<B>, B>,
{
    let batch_size  = cfg.data.batch_size;
    let report_every = cfg.training.batches_per_report;
    let num_batches = data.train.len() / batch_size;
    let pad_id      = data.train.vocab.pad_id();
    let settings    = EvalSettings {
        batch_size,
        max_len:    cfg.data.max_len,
        model_type: cfg.model.model_type,
    };

    let mut rng   = StdRng::seed_from_u64(cfg.training.random_seed);
    let mut state = TrainerState::new();

    let train_batcher = MinibatchBatcher::<B>::new(device.clone());
    let valid_batcher = MinibatchBatcher::<B::InnerBackend>::new(device.clone());

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in start_epoch..cfg.training.epochs {
        state.checkpoint_if_improved(epoch, |e| {
            let path = services.checkpoints.replace_best::<B, _>(&model, e)?;
            tracing::info!("Checkpoint saved to '{}'", path.display());
            Ok(())
        })?;
        state.begin_epoch(epoch);

        // ── Training phase ────────────────────────────────────────────────────
        for i in (0..data.train.len()).step_by(batch_size) {
            let batch_idx = i / batch_size;

            let mb = minibatch(
                &data.train, &data.train, i, batch_size,
                cfg.data.max_len, cfg.model.model_type, false, &mut rng,
            );
            let batch = train_batcher.batch(&mb);

            let output = model.forward(&batch.src, batch.tgt_input, batch.aux.as_ref());
            let loss   = masked_cross_entropy(output.logits, batch.tgt_output, pad_id);
            state.record_loss(scalar(loss.clone()));

            model = train_step(model, &mut optim, loss, cfg.training.learning_rate, cfg.training.max_norm);

            if batch_idx % report_every == 0 {
                let (wps, avg_loss) = state.take_report(batch_size * report_every);
                tracing::info!(
                    "EPOCH: {} ITER: {}/{} WPS: {:.2} LOSS: {:.4} DEV_LOSS: {:.4} DEV_PERFORM: {:.4}",
                    epoch, batch_idx, num_batches, wps, avg_loss, state.dev_loss, state.cur_metric,
                );
            }
        }

        // ── Validation phase ──────────────────────────────────────────────────
        tracing::info!("EPOCH {} COMPLETE. VALIDATING...", epoch);
        state.begin_validation(epoch);
        let model_valid = model.valid();

        tracing::info!("Reading validation data ...");
        let (src_dev, tgt_dev) = data.loader.load_pair(&data.src_dev, &data.tgt_dev)?;
        let started = Instant::now();

        tracing::info!("Computing dev_loss on validation data ...");
        let dev_loss = evaluate_lpp(&model_valid, &src_dev, &src_dev, settings, &valid_batcher, &mut rng);

        let metrics = if bleu && epoch >= cfg.training.bleu_start_epoch {
            let report = inference_metrics(&model_valid, &src_dev, &tgt_dev, settings, &valid_batcher, &mut rng);
            services.outputs.write_report(&epoch.to_string(), &report)?;

            tracing::info!("eval_precision: {:.4}", report.precision);
            tracing::info!("eval_recall: {:.4}", report.recall);
            tracing::info!("eval_edit_distance: {:.4}", report.edit_distance);
            tracing::info!("eval_bleu: {:.4}", report.bleu);
            EpochMetrics {
                epoch,
                dev_loss,
                metric:        report.bleu,
                edit_distance: Some(report.edit_distance),
                precision:     Some(report.precision),
                recall:        Some(report.recall),
            }
        } else {
            tracing::info!("Computing model performance on validation data ...");
            let (metric, decoded) = evaluate_lpp_val(&model_valid, &src_dev, &tgt_dev, settings, &valid_batcher)?;
            services.outputs.write_candidates(&epoch.to_string(), &decoded)?;
            EpochMetrics::loss_only(epoch, dev_loss, metric)
        };

        services.metrics.log(&metrics)?;
        state.finish_validation(dev_loss, metrics.metric);
        tracing::info!(
            "DEV_LOSS: {:.4}. DEV_PERFORMANCE: {:.4}. TIME: {:.2}s CHECKPOINTING...",
            dev_loss,
            metrics.metric,
            started.elapsed().as_secs_f64(),
        );
    }

    state.finish();
    tracing::info!("Training complete!");
    Ok(state)
}
