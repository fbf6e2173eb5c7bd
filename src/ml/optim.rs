// ============================================================
// Layer 5 — Adadelta Optimiser
// ============================================================
// Burn ships Adam and SGD but not Adadelta, so it is written as
// a SimpleOptimizer and wrapped by Burn's OptimizerAdaptor like
// the built-in ones.
//
// Per parameter tensor (Zeiler 2012, with a learning rate):
//   E[g²]  = ρ·E[g²]  + (1-ρ)·g²
//   Δ      = √(E[Δ²] + ε) / √(E[g²] + ε) · g
//   E[Δ²]  = ρ·E[Δ²]  + (1-ρ)·Δ²
//   θ      = θ - lr·Δ

use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, SimpleOptimizer},
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
    LearningRate,
};

#[derive(Config)]
pub struct AdadeltaConfig {
    #[config(default = 0.9)]
    pub rho:           f32,
    #[config(default = 1e-6)]
    pub epsilon:       f32,
    pub grad_clipping: Option<GradientClippingConfig>,
}

impl AdadeltaConfig {
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Adadelta, M, B> {
        let optim = Adadelta { rho: self.rho, epsilon: self.epsilon };
        let mut optim = OptimizerAdaptor::from(optim);
        if let Some(config) = &self.grad_clipping {
            optim = optim.with_grad_clipping(config.init());
        }
        optim
    }
}

#[derive(Clone, Debug)]
pub struct Adadelta {
    rho:     f32,
    epsilon: f32,
}

/// Running averages for one parameter tensor.
#[derive(Record, Clone)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    pub square_avg: Tensor<B, D>,
    pub acc_delta:  Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (square_avg, acc_delta) = match state {
            Some(state) => (state.square_avg, state.acc_delta),
            None        => (grad.zeros_like(), grad.zeros_like()),
        };

        let square_avg = square_avg
            .mul_scalar(self.rho)
            .add(grad.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho));
        let std   = square_avg.clone().add_scalar(self.epsilon).sqrt();
        let delta = acc_delta.clone().add_scalar(self.epsilon).sqrt().div(std).mul(grad);
        let acc_delta = acc_delta
            .mul_scalar(self.rho)
            .add(delta.clone().powf_scalar(2.0).mul_scalar(1.0 - self.rho));

        let tensor = tensor.sub(delta.mul_scalar(lr));
        (tensor, Some(AdadeltaState { square_avg, acc_delta }))
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.square_avg = state.square_avg.to_device(device);
        state.acc_delta  = state.acc_delta.to_device(device);
        state
    }
}
