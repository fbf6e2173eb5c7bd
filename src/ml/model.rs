use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, softmax},
};

use crate::application::config::RunConfig;
use crate::data::batcher::TokenBatch;
use crate::domain::model_type::ModelType;

/// Decodes past `max_len` (retrieval validation) need a few spare positions.
pub const MIN_POSITIONS: usize = 20;

// ─── RewriteModel ─────────────────────────────────────────────────────────────
pub struct DecoderOutput<B: Backend> {
    /// [batch, tgt_len, vocab]
    pub logits: Tensor<B, 3>,
    /// softmax(logits) over the vocabulary
    pub probs:  Tensor<B, 3>,
}

/// The trainable sequence model as seen by the training loop,
/// the evaluator and the greedy decoder.
pub trait RewriteModel<B: Backend> {
    fn forward(
        &self,
        src:       &TokenBatch<B>,
        tgt_input: Tensor<B, 2, Int>,
        aux:       Option<&TokenBatch<B>>,
    ) -> DecoderOutput<B>;
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct StyleTransferConfig {
    pub vocab_size:     usize,
    pub max_positions:  usize,
    pub model_type:     ModelType,
    #[config(default = 128)]
    pub emb_dim:        usize,
    #[config(default = 4)]
    pub num_heads:      usize,
    #[config(default = 2)]
    pub num_layers:     usize,
    #[config(default = 512)]
    pub ff_dim:         usize,
    #[config(default = 0.2)]
    pub dropout:        f64,
    #[config(default = 2)]
    pub num_attributes: usize,
}

impl StyleTransferConfig {
    pub fn from_run(cfg: &RunConfig, vocab_size: usize) -> Self {
        let m = &cfg.model;
        Self::new(vocab_size, cfg.data.max_len.max(MIN_POSITIONS) + 2, m.model_type)
            .with_emb_dim(m.emb_dim)
            .with_num_heads(m.num_heads)
            .with_num_layers(m.num_layers)
            .with_ff_dim(m.ff_dim)
            .with_dropout(m.dropout)
            .with_num_attributes(m.num_attributes)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> StyleTransferModel<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.emb_dim).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_positions, self.emb_dim).init(device);
        let encoder: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let decoder: Vec<DecoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_decoder_block(device))
            .collect();

        let attribute_embedding = (self.model_type == ModelType::Delete)
            .then(|| EmbeddingConfig::new(self.num_attributes, self.emb_dim).init(device));
        let aux_encoder: Vec<EncoderBlock<B>> = if self.model_type == ModelType::DeleteRetrieve {
            (0..self.num_layers).map(|_| self.build_encoder_block(device)).collect()
        } else {
            Vec::new()
        };

        let final_norm  = LayerNormConfig::new(self.emb_dim).init(device);
        let output_proj = LinearConfig::new(self.emb_dim, self.vocab_size).init(device);
        let dropout     = DropoutConfig::new(self.dropout).init();
        StyleTransferModel {
            token_embedding, position_embedding, encoder, decoder,
            attribute_embedding, aux_encoder,
            final_norm, output_proj, dropout,
            max_positions: self.max_positions,
        }
    }

    fn attention<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        MultiHeadAttentionConfig::new(self.emb_dim, self.num_heads)
            .with_dropout(self.dropout)
            .init(device)
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = self.attention(device);
        let ffn_linear1 = LinearConfig::new(self.emb_dim, self.ff_dim).init(device);
        let ffn_linear2 = LinearConfig::new(self.ff_dim, self.emb_dim).init(device);
        let norm1   = LayerNormConfig::new(self.emb_dim).init(device);
        let norm2   = LayerNormConfig::new(self.emb_dim).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }

    fn build_decoder_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        let self_attn   = self.attention(device);
        let cross_attn  = self.attention(device);
        let ffn_linear1 = LinearConfig::new(self.emb_dim, self.ff_dim).init(device);
        let ffn_linear2 = LinearConfig::new(self.ff_dim, self.emb_dim).init(device);
        let norm1   = LayerNormConfig::new(self.emb_dim).init(device);
        let norm2   = LayerNormConfig::new(self.emb_dim).init(device);
        let norm3   = LayerNormConfig::new(self.emb_dim).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        DecoderBlock { self_attn, cross_attn, ffn_linear1, ffn_linear2, norm1, norm2, norm3, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// pad_mask: [batch, seq_len], true = padding
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self.self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub cross_attn:  MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub norm3:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(
        &self,
        x:           Tensor<B, 3>,
        causal_mask: Tensor<B, 3, Bool>,
        memory:      Tensor<B, 3>,
        memory_mask: Tensor<B, 2, Bool>,
    ) -> Tensor<B, 3> {
        let self_out = self.self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_attn(causal_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(self_out));

        let cross_out = self.cross_attn
            .forward(MhaInput::new(x.clone(), memory.clone(), memory).mask_pad(memory_mask))
            .context;
        let x = self.norm2.forward(x + self.dropout.forward(cross_out));

        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm3.forward(x + self.dropout.forward(ffn_out))
    }
}

// ─── StyleTransferModel ───────────────────────────────────────────────────────
// Encoder–decoder transformer. The decoder cross-attends to
// [content memory ; auxiliary memory] where the auxiliary part is
//   delete          → one attribute embedding per example
//   delete_retrieve → attribute tokens through their own encoder
//   seq2seq         → nothing
#[derive(Module, Debug)]
pub struct StyleTransferModel<B: Backend> {
    pub token_embedding:     Embedding<B>,
    pub position_embedding:  Embedding<B>,
    pub encoder:             Vec<EncoderBlock<B>>,
    pub decoder:             Vec<DecoderBlock<B>>,
    pub attribute_embedding: Option<Embedding<B>>,
    pub aux_encoder:         Vec<EncoderBlock<B>>,
    pub final_norm:          LayerNorm<B>,
    pub output_proj:         Linear<B>,
    pub dropout:             Dropout,
    pub max_positions:       usize,
}

impl<B: Backend> StyleTransferModel<B> {
    /// Token + learned position embeddings. Positions past the table
    /// reuse its last row.
    fn embed(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let device  = ids.device();
        let tok_emb = self.token_embedding.forward(ids);

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .clamp_max(self.max_positions as i64 - 1)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        self.dropout.forward(tok_emb + pos_emb)
    }

    fn encode(&self, layers: &[EncoderBlock<B>], batch: &TokenBatch<B>) -> Tensor<B, 3> {
        let mut x = self.embed(batch.ids.clone());
        for layer in layers {
            x = layer.forward(x, batch.pad_mask.clone());
        }
        x
    }

    fn memory(&self, src: &TokenBatch<B>, aux: Option<&TokenBatch<B>>) -> (Tensor<B, 3>, Tensor<B, 2, Bool>) {
        let content = self.encode(&self.encoder, src);
        let Some(aux) = aux else {
            return (content, src.pad_mask.clone());
        };

        let aux_memory = match &self.attribute_embedding {
            Some(embedding) => embedding.forward(aux.ids.clone()),
            None            => self.encode(&self.aux_encoder, aux),
        };
        (
            Tensor::cat(vec![content, aux_memory], 1),
            Tensor::cat(vec![src.pad_mask.clone(), aux.pad_mask.clone()], 1),
        )
    }

    pub fn vocab_size(&self) -> usize {
        self.output_proj.weight.dims()[1]
    }
}

impl<B: Backend> RewriteModel<B> for StyleTransferModel<B> {
    fn forward(
        &self,
        src:       &TokenBatch<B>,
        tgt_input: Tensor<B, 2, Int>,
        aux:       Option<&TokenBatch<B>>,
    ) -> DecoderOutput<B> {
        let [batch_size, tgt_len] = tgt_input.dims();
        let device = tgt_input.device();

        let (memory, memory_mask) = self.memory(src, aux);
        let causal_mask = generate_autoregressive_mask::<B>(batch_size, tgt_len, &device);

        let mut x = self.embed(tgt_input);
        for layer in &self.decoder {
            x = layer.forward(x, causal_mask.clone(), memory.clone(), memory_mask.clone());
        }
        let logits = self.output_proj.forward(self.final_norm.forward(x));
        let probs  = softmax(logits.clone(), 2);
        DecoderOutput { logits, probs }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::MinibatchBatcher;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny(model_type: ModelType) -> StyleTransferModel<TestBackend> {
        StyleTransferConfig::new(12, 8, model_type)
            .with_emb_dim(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_ff_dim(32)
            .with_dropout(0.0)
            .init(&Default::default())
    }

    #[test]
    fn test_output_shapes_for_every_model_type() {
        let batcher = MinibatchBatcher::<TestBackend>::new(Default::default());
        let src     = batcher.attribute_batch(&[4, 5]);
        let tgt     = batcher.ids(&[vec![2, 4, 5], vec![2, 6, 1]]);

        for model_type in [ModelType::Seq2seq, ModelType::Delete, ModelType::DeleteRetrieve] {
            let model = tiny(model_type);
            let aux   = match model_type {
                ModelType::Seq2seq        => None,
                ModelType::Delete         => Some(batcher.attribute_batch(&[0, 1])),
                ModelType::DeleteRetrieve => Some(batcher.attribute_batch(&[7, 8])),
            };
            let out = model.forward(&src, tgt.clone(), aux.as_ref());
            assert_eq!(out.logits.dims(), [2, 3, 12]);
            assert_eq!(out.probs.dims(), [2, 3, 12]);
            assert_eq!(model.vocab_size(), 12);
        }
    }

    #[test]
    fn test_probs_sum_to_one() {
        let batcher = MinibatchBatcher::<TestBackend>::new(Default::default());
        let model   = tiny(ModelType::Seq2seq);
        let out     = model.forward(&batcher.attribute_batch(&[3]), batcher.ids(&[vec![2, 3]]), None);
        let sums: Vec<f32> = out.probs.sum_dim(2).into_data().to_vec().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_positions_past_table_are_clamped() {
        let batcher = MinibatchBatcher::<TestBackend>::new(Default::default());
        let model   = tiny(ModelType::Seq2seq);
        let long    = batcher.ids(&[vec![2; 12]]);
        let out     = model.forward(&batcher.attribute_batch(&[3]), long, None);
        assert_eq!(out.logits.dims(), [1, 12, 12]);
    }
}
