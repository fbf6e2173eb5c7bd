// ============================================================
// Layer 5 — Pad-masked Cross Entropy
// ============================================================
// Token-level cross entropy where every target equal to the
// pad id carries weight 0:
//
//   loss = -Σ w_i · log p(y_i)  /  Σ w_i        w_i = [y_i ≠ pad]
//
// which is the weighted mean over the non-pad targets. A batch
// made only of pads yields 0 instead of NaN.

use burn::{prelude::*, tensor::activation::log_softmax};

/// logits: [batch, seq_len, vocab], targets: [batch, seq_len] → scalar [1]
pub fn masked_cross_entropy<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    pad_id:  usize,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, _] = logits.dims();

    let log_probs = log_softmax(logits, 2);
    let picked    = log_probs
        .gather(2, targets.clone().unsqueeze_dim::<3>(2))
        .reshape([batch_size, seq_len]);
    let weights   = targets.not_equal_elem(pad_id as i64).float();

    let total = (picked * weights.clone()).sum().neg();
    total / weights.sum().clamp_min(1.0)
}

/// Host-side value of a scalar loss tensor.
pub fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f64 {
    loss.into_scalar().elem::<f64>()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray;

    fn targets(rows: Vec<i64>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(rows, shape), &Default::default())
    }

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        let logits = Tensor::<TestBackend, 3>::zeros([1, 2, 4], &Default::default());
        let loss   = scalar(masked_cross_entropy(logits, targets(vec![0, 2], [1, 2]), 1));
        assert!((loss - 4f64.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_pad_targets_are_ignored() {
        // row 0 predicts id 2 with certainty; the second target is padding
        let logits = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(
                vec![0.0f32, 0.0, 50.0, 0.0,   50.0, 0.0, 0.0, 0.0],
                [1, 2, 4],
            ),
            &Default::default(),
        );
        let loss = scalar(masked_cross_entropy(logits, targets(vec![2, 1], [1, 2]), 1));
        assert!(loss.abs() < 1e-4);
    }

    #[test]
    fn test_all_pad_batch_is_zero() {
        let logits = Tensor::<TestBackend, 3>::zeros([2, 3, 5], &Default::default());
        let loss   = scalar(masked_cross_entropy(logits, targets(vec![1; 6], [2, 3]), 1));
        assert_eq!(loss, 0.0);
    }
}
