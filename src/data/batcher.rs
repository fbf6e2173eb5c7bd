// ============================================================
// Layer 4 — Minibatch Batcher
// ============================================================
// Moves host-side id batches onto a Burn device.
//
// A Minibatch from the provider holds Vec<Vec<usize>> rows
// that are already padded to a common width, so batching is
// a flatten + reshape:
//   [r1_t1, .., r1_tL, r2_t1, .., rN_tL] → [N, L]
//
// Pad masks become Bool tensors (true = pad) because that is
// what Burn's attention modules take for mask_pad.
//
// The batcher is generic over the backend so training builds
// batches on Autodiff<Wgpu> and evaluation on the inner one.

use burn::{prelude::*, tensor::TensorData};

use crate::data::codec::EncodedSequence;
use crate::data::minibatch::{AuxBatch, Minibatch, PaddedBatch};

// ─── TokenBatch ───────────────────────────────────────────────────────────────
/// One padded token batch on the device.
#[derive(Debug, Clone)]
pub struct TokenBatch<B: Backend> {
    /// Token ids — shape: [batch_size, seq_len]
    pub ids:      Tensor<B, 2, Int>,
    /// True lengths per row
    pub lengths:  Vec<usize>,
    /// true = pad — shape: [batch_size, seq_len]
    pub pad_mask: Tensor<B, 2, Bool>,
}

impl<B: Backend> TokenBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.ids.dims()[0]
    }
}

// ─── MinibatchTensors ─────────────────────────────────────────────────────────
/// Everything one forward pass needs.
#[derive(Debug, Clone)]
pub struct MinibatchTensors<B: Backend> {
    pub src:        TokenBatch<B>,
    pub aux:        Option<TokenBatch<B>>,
    /// Teacher-forcing decoder input (`<s> w1 .. wn`)
    pub tgt_input:  Tensor<B, 2, Int>,
    /// Gold continuation (`w1 .. wn </s>`)
    pub tgt_output: Tensor<B, 2, Int>,
}

// ─── MinibatchBatcher ─────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct MinibatchBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MinibatchBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch(&self, mb: &Minibatch) -> MinibatchTensors<B> {
        let src = self.padded(&mb.content);
        let aux = match &mb.aux {
            AuxBatch::None => None,
            AuxBatch::AttributeIds(ids) => Some(self.attribute_batch(ids)),
            AuxBatch::Sequence(aux) => Some(self.padded(aux)),
        };
        MinibatchTensors {
            src,
            aux,
            tgt_input:  self.ids(&mb.output.input_ids),
            tgt_output: self.ids(&mb.output.output_ids),
        }
    }

    /// Input side of a padded batch.
    fn padded(&self, batch: &PaddedBatch) -> TokenBatch<B> {
        self.token_batch(&batch.input_ids, &batch.mask, batch.lengths.clone())
    }

    /// One row from the batch codec as a batch of size one.
    pub fn encoded(&self, seq: &EncodedSequence) -> TokenBatch<B> {
        self.token_batch(
            std::slice::from_ref(&seq.ids),
            std::slice::from_ref(&seq.mask),
            vec![seq.length],
        )
    }

    /// Attribute ids as a [batch, 1] sequence with no padding.
    pub fn attribute_batch(&self, ids: &[usize]) -> TokenBatch<B> {
        let rows: Vec<Vec<usize>> = ids.iter().map(|&id| vec![id]).collect();
        let mask: Vec<Vec<u8>>    = vec![vec![0]; ids.len()];
        self.token_batch(&rows, &mask, vec![1; ids.len()])
    }

    pub fn ids(&self, rows: &[Vec<usize>]) -> Tensor<B, 2, Int> {
        let (batch_size, seq_len) = shape_of(rows);
        let flat: Vec<i64> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&x| x as i64))
            .collect();
        Tensor::from_data(TensorData::new(flat, [batch_size, seq_len]), &self.device)
    }

    fn token_batch(&self, rows: &[Vec<usize>], mask: &[Vec<u8>], lengths: Vec<usize>) -> TokenBatch<B> {
        let (batch_size, seq_len) = shape_of(rows);
        let flat_mask: Vec<bool> = mask
            .iter()
            .flat_map(|row| row.iter().map(|&m| m == 1))
            .collect();
        let pad_mask = Tensor::from_data(TensorData::new(flat_mask, [batch_size, seq_len]), &self.device);
        TokenBatch { ids: self.ids(rows), lengths, pad_mask }
    }
}

fn shape_of(rows: &[Vec<usize>]) -> (usize, usize) {
    (rows.len(), rows.first().map_or(0, Vec::len))
}

/// Pull an id tensor back to host rows.
pub fn tensor_rows<B: Backend>(tensor: Tensor<B, 2, Int>) -> Vec<Vec<usize>> {
    let [batch_size, seq_len] = tensor.dims();
    if seq_len == 0 {
        return vec![Vec::new(); batch_size];
    }
    let flat: Vec<usize> = tensor
        .into_data()
        .iter::<i64>()
        .map(|x| x.max(0) as usize)
        .collect();
    flat.chunks(seq_len).map(<[usize]>::to_vec).collect()
}
