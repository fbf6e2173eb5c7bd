// ============================================================
// Layer 5 — Greedy Decoder
// ============================================================
// Argmax decoding without teacher forcing.
//
//   tgt = [<s>]                        shape [batch, 1]
//   repeat max_len times:
//       probs = model(src, tgt, aux)    [batch, len, vocab]
//       next  = argmax(probs[:, -1])    [batch, 1]
//       tgt   = cat(tgt, next)
//
// Exactly max_len steps are taken; nothing stops at </s>. The
// result therefore has max_len + 1 columns including the leading
// start id, and callers trim at the first </s>.
//
// GreedySteps yields one predicted column per step so that a
// caller can stop early without changing what was produced so far.

use burn::prelude::*;

use crate::data::batcher::TokenBatch;
use crate::ml::model::RewriteModel;

pub struct GreedySteps<'a, B: Backend, M: RewriteModel<B>> {
    model:     &'a M,
    src:       &'a TokenBatch<B>,
    aux:       Option<&'a TokenBatch<B>>,
    tgt:       Tensor<B, 2, Int>,
    remaining: usize,
}

impl<'a, B: Backend, M: RewriteModel<B>> GreedySteps<'a, B, M> {
    pub fn new(
        model:    &'a M,
        src:      &'a TokenBatch<B>,
        aux:      Option<&'a TokenBatch<B>>,
        start_id: usize,
        max_len:  usize,
    ) -> Self {
        let tgt = Tensor::full([src.batch_size(), 1], start_id as i64, &src.ids.device());
        Self { model, src, aux, tgt, remaining: max_len }
    }

    /// Decoder input built so far, start column included.
    pub fn prefix(&self) -> Tensor<B, 2, Int> {
        self.tgt.clone()
    }
}

impl<B: Backend, M: RewriteModel<B>> Iterator for GreedySteps<'_, B, M> {
    type Item = Tensor<B, 2, Int>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let probs = self.model.forward(self.src, self.tgt.clone(), self.aux).probs;
        let [batch_size, len, vocab] = probs.dims();
        let next = probs
            .slice([0..batch_size, len - 1..len, 0..vocab])
            .argmax(2)
            .reshape([batch_size, 1]);

        self.tgt = Tensor::cat(vec![self.tgt.clone(), next.clone()], 1);
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Greedy-decode `max_len` tokens → [batch, max_len + 1].
pub fn decode_minibatch<B: Backend, M: RewriteModel<B>>(
    max_len:  usize,
    start_id: usize,
    model:    &M,
    src:      &TokenBatch<B>,
    aux:      Option<&TokenBatch<B>>,
) -> Tensor<B, 2, Int> {
    let mut steps = GreedySteps::new(model, src, aux, start_id, max_len);
    steps.by_ref().for_each(drop);
    steps.prefix()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::{tensor_rows, MinibatchBatcher};
    use crate::domain::model_type::ModelType;
    use crate::ml::model::{DecoderOutput, StyleTransferConfig};
    use burn::{backend::NdArray, tensor::TensorData};
    use std::cell::Cell;

    type TestBackend = NdArray;

    /// Predicts (last input token + 1) mod vocab and counts its calls.
    struct CountingModel {
        vocab: usize,
        calls: Cell<usize>,
    }

    impl RewriteModel<TestBackend> for CountingModel {
        fn forward(
            &self,
            _src:      &TokenBatch<TestBackend>,
            tgt_input: Tensor<TestBackend, 2, Int>,
            _aux:      Option<&TokenBatch<TestBackend>>,
        ) -> DecoderOutput<TestBackend> {
            self.calls.set(self.calls.get() + 1);
            let rows = tensor_rows(tgt_input);
            let (b, l) = (rows.len(), rows[0].len());
            let mut probs = vec![0.0f32; b * l * self.vocab];
            for (i, row) in rows.iter().enumerate() {
                for (j, &tok) in row.iter().enumerate() {
                    probs[(i * l + j) * self.vocab + (tok + 1) % self.vocab] = 1.0;
                }
            }
            let probs = Tensor::from_data(TensorData::new(probs, [b, l, self.vocab]), &Default::default());
            DecoderOutput { logits: probs.clone(), probs }
        }
    }

    #[test]
    fn test_shape_and_no_early_stop() {
        let batcher = MinibatchBatcher::<TestBackend>::new(Default::default());
        let src     = batcher.attribute_batch(&[4, 4]);
        let model   = CountingModel { vocab: 6, calls: Cell::new(0) };

        let out = decode_minibatch(5, 2, &model, &src, None);
        assert_eq!(out.dims(), [2, 6]);
        // 2 → 3 (</s>) → 4 → 5 → 0 → 1: decoding runs straight through </s>
        assert_eq!(tensor_rows(out), vec![vec![2, 3, 4, 5, 0, 1]; 2]);
        assert_eq!(model.calls.get(), 5);
    }

    #[test]
    fn test_zero_steps_is_start_column() {
        let batcher = MinibatchBatcher::<TestBackend>::new(Default::default());
        let src     = batcher.attribute_batch(&[4]);
        let model   = CountingModel { vocab: 6, calls: Cell::new(0) };
        assert_eq!(tensor_rows(decode_minibatch(0, 2, &model, &src, None)), vec![vec![2]]);
        assert_eq!(model.calls.get(), 0);
    }

    #[test]
    fn test_steps_yield_one_column_each() {
        let batcher = MinibatchBatcher::<TestBackend>::new(Default::default());
        let src     = batcher.attribute_batch(&[4]);
        let model   = CountingModel { vocab: 6, calls: Cell::new(0) };
        let cols: Vec<Vec<Vec<usize>>> = GreedySteps::new(&model, &src, None, 2, 3)
            .map(tensor_rows)
            .collect();
        assert_eq!(cols, vec![vec![vec![3]], vec![vec![4]], vec![vec![5]]]);
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let model = StyleTransferConfig::new(10, 24, ModelType::Delete)
            .with_emb_dim(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_ff_dim(32)
            .init::<TestBackend>(&Default::default());
        let batcher = MinibatchBatcher::<TestBackend>::new(Default::default());
        let src     = batcher.ids(&[vec![2, 5, 6], vec![2, 7, 1]]);
        let src     = TokenBatch {
            ids:      src,
            lengths:  vec![3, 2],
            pad_mask: Tensor::from_data(
                TensorData::new(vec![false, false, false, false, false, true], [2, 3]),
                &Default::default(),
            ),
        };
        let aux = batcher.attribute_batch(&[1, 1]);

        let first  = tensor_rows(decode_minibatch(6, 2, &model, &src, Some(&aux)));
        let second = tensor_rows(decode_minibatch(6, 2, &model, &src, Some(&aux)));
        assert_eq!(first, second);
        assert_eq!(first[0].len(), 7);
    }
}
