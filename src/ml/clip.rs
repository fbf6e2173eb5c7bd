// ============================================================
// Layer 5 — Global Gradient-Norm Clipping
// ============================================================
// Clips the gradients of a whole model by their joint L2 norm:
//
//   norm = sqrt( Σ_params Σ_i g_i² )
//   if norm > max_norm:  every g ← g · max_norm / norm
//
// Burn's optimiser hook (GradientClippingConfig::Norm) clips each
// parameter tensor on its own, so the step of a model with many
// tensors is not bounded by max_norm. This works on the
// GradientsParams produced by from_grads(), before optim.step().
//
// Two visitor passes over the model's parameter ids:
//   NormAccumulator → squared sum over every registered gradient
//   GradScaler      → remove, scale, register again

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::marker::PhantomData;

struct NormAccumulator<'a, B: AutodiffBackend> {
    grads:  &'a GradientsParams,
    sq_sum: Option<Tensor<B::InnerBackend, 1>>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for NormAccumulator<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) else {
            return;
        };
        let sq = (grad.clone() * grad).sum();
        self.sq_sum = Some(match self.sq_sum.take() {
            Some(total) => total + sq,
            None        => sq,
        });
    }
}

struct GradScaler<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    scale: f64,
    _b:    PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradScaler<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.scale));
    }
}

/// Joint L2 norm of all gradients of `model` (0 when there are none).
pub fn global_grad_norm<B, M>(model: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut acc = NormAccumulator::<B> { grads, sq_sum: None };
    model.visit(&mut acc);
    acc.sq_sum
        .map(|t| t.into_scalar().elem::<f64>().sqrt())
        .unwrap_or(0.0)
}

/// Scale every gradient so the joint norm is at most `max_norm`.
/// Returns the norm before clipping.
pub fn clip_grad_norm<B, M>(model: &M, grads: &mut GradientsParams, max_norm: f64) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(model, grads);
    if norm > max_norm {
        let mut scaler = GradScaler::<B> { grads, scale: max_norm / norm, _b: PhantomData };
        model.visit(&mut scaler);
    }
    norm
}
