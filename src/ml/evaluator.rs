// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Validation passes over a (source, target) corpus pair.
//
//   evaluate_lpp       → teacher-forced loss, no decoding
//   decode_dataset     → greedy decode every minibatch and turn
//                        inputs / preds / golds / auxs back into
//                        tokens in corpus order
//   inference_metrics  → decode_dataset + BLEU, edit distance,
//                        precision / recall
//   evaluate_lpp_val   → retrieval variant: for every source
//                        example, score and decode each of its
//                        nearest target-domain neighbours
//
// Every pass runs on whatever backend the model lives on; the
// training loop hands in `model.valid()` so dropout is off.

use anyhow::{anyhow, Result};
use burn::prelude::*;
use rand::Rng;
use std::io::Write;

use crate::data::batcher::{tensor_rows, MinibatchBatcher, TokenBatch};
use crate::data::codec::{encode_line, id2word, ids_to_tokens, word2id, CodecTag};
use crate::data::corpus::Corpus;
use crate::data::minibatch::{minibatch, unsort, AuxBatch, TARGET_ATTRIBUTE_ID};
use crate::domain::model_type::ModelType;
use crate::domain::records::EvaluationRecord;
use crate::domain::traits::NeighborIndex;
use crate::ml::decoder::decode_minibatch;
use crate::ml::loss::{masked_cross_entropy, scalar};
use crate::ml::model::RewriteModel;
use crate::scoring::{average, get_bleu, get_edit_distance, get_precisions_recalls};

/// Length of the continuation decoded for each retrieved neighbour
pub const RETRIEVAL_DECODE_LEN: usize = 20;

/// Placeholder aux entry for models without an auxiliary input
pub const NO_AUX_PLACEHOLDER: &str = "None";

#[derive(Debug, Clone, Copy)]
pub struct EvalSettings {
    pub batch_size: usize,
    pub max_len:    usize,
    pub model_type: ModelType,
}

/// Scores of one full inference pass plus the rendered lines.
#[derive(Debug, Clone)]
pub struct InferenceReport {
    pub bleu:          f64,
    pub edit_distance: f64,
    pub precision:     f64,
    pub recall:        f64,
    pub inputs:        Vec<String>,
    pub preds:         Vec<String>,
    pub golds:         Vec<String>,
    pub auxs:          Vec<String>,
}

/// Mean teacher-forced loss over all minibatches (NaN for an empty corpus).
pub fn evaluate_lpp<B: Backend, M: RewriteModel<B>, R: Rng>(
    model:    &M,
    src:      &Corpus,
    tgt:      &Corpus,
    settings: EvalSettings,
    batcher:  &MinibatchBatcher<B>,
    rng:      &mut R,
) -> f64 {
    let pad_id = tgt.vocab.pad_id();
    let losses: Vec<f64> = (0..src.len())
        .step_by(settings.batch_size)
        .map(|j| {
            let mb = minibatch(src, tgt, j, settings.batch_size, settings.max_len, settings.model_type, true, &mut *rng);
            let t  = batcher.batch(&mb);
            let out = model.forward(&t.src, t.tgt_input, t.aux.as_ref());
            scalar(masked_cross_entropy(out.logits, t.tgt_output, pad_id))
        })
        .collect();
    mean(&losses)
}

/// Greedy-decode the whole corpus pair, in corpus order.
pub fn decode_dataset<B: Backend, M: RewriteModel<B>, R: Rng>(
    model:    &M,
    src:      &Corpus,
    tgt:      &Corpus,
    settings: EvalSettings,
    batcher:  &MinibatchBatcher<B>,
    rng:      &mut R,
) -> Vec<EvaluationRecord> {
    let vocab    = tgt.vocab.as_ref();
    let total    = src.len();
    let mut out  = Vec::with_capacity(total);
    let mut progress = std::io::stderr();

    for j in (0..total).step_by(settings.batch_size) {
        let _ = write!(progress, "\r{j}/{total}...");
        let _ = progress.flush();

        let mb = minibatch(src, tgt, j, settings.batch_size, settings.max_len, settings.model_type, true, rng);
        let t  = batcher.batch(&mb);
        let predicted = decode_minibatch(settings.max_len, vocab.start_id(), model, &t.src, t.aux.as_ref());

        let to_tokens = |rows: &[Vec<usize>]| -> Vec<Vec<String>> {
            rows.iter().map(|row| ids_to_tokens(row, vocab)).collect()
        };
        let inputs = to_tokens(&mb.content.output_ids);
        let preds  = to_tokens(&tensor_rows(predicted));
        let golds  = to_tokens(&mb.output.output_ids);
        let auxs: Vec<Vec<String>> = match &mb.aux {
            AuxBatch::AttributeIds(ids) => ids.iter().map(|id| vec![id.to_string()]).collect(),
            AuxBatch::Sequence(aux)     => to_tokens(&aux.input_ids),
            AuxBatch::None              => vec![vec![NO_AUX_PLACEHOLDER.to_string()]; preds.len()],
        };

        let order = mb.order();
        let rows  = unsort(inputs, order)
            .into_iter()
            .zip(unsort(preds, order))
            .zip(unsort(golds, order))
            .zip(unsort(auxs, order))
            .map(|(((input, prediction), reference), aux)| EvaluationRecord { input, prediction, reference, aux });
        out.extend(rows);
    }
    if total > 0 {
        let _ = writeln!(progress);
    }
    out
}

/// Decode, then score against the references.
pub fn inference_metrics<B: Backend, M: RewriteModel<B>, R: Rng>(
    model:    &M,
    src:      &Corpus,
    tgt:      &Corpus,
    settings: EvalSettings,
    batcher:  &MinibatchBatcher<B>,
    rng:      &mut R,
) -> InferenceReport {
    let records = decode_dataset(model, src, tgt, settings, batcher, rng);
    score_records(&records)
}

pub fn score_records(records: &[EvaluationRecord]) -> InferenceReport {
    let inputs: Vec<Vec<String>> = records.iter().map(|r| r.input.clone()).collect();
    let preds:  Vec<Vec<String>> = records.iter().map(|r| r.prediction.clone()).collect();
    let golds:  Vec<Vec<String>> = records.iter().map(|r| r.reference.clone()).collect();

    let (precisions, recalls) = get_precisions_recalls(&inputs, &preds, &golds);
    let join = |seqs: Vec<Vec<String>>| seqs.into_iter().map(|s| s.join(" ")).collect::<Vec<_>>();

    InferenceReport {
        bleu:          get_bleu(&preds, &golds),
        edit_distance: get_edit_distance(&preds, &golds),
        precision:     average(&precisions),
        recall:        average(&recalls),
        auxs:          records.iter().map(|r| r.aux.join(" ")).collect(),
        inputs:        join(inputs),
        preds:         join(preds),
        golds:         join(golds),
    }
}

/// Retrieval-augmented validation.
///
/// For every source example the target corpus index returns its
/// nearest neighbours. Each neighbour's content is encoded as the
/// encoder input, its attributes as the auxiliary input, and its full
/// sentence as the teacher-forced target. Returns the mean loss over
/// all (example, neighbour) pairs and the decoded candidates grouped
/// per source example.
pub fn evaluate_lpp_val<B: Backend, M: RewriteModel<B>>(
    model:    &M,
    src:      &Corpus,
    tgt:      &Corpus,
    settings: EvalSettings,
    batcher:  &MinibatchBatcher<B>,
) -> Result<(f64, Vec<Vec<String>>)> {
    let index = tgt
        .searcher
        .as_ref()
        .ok_or_else(|| anyhow!("target corpus has no retrieval index"))?;
    let vocab  = tgt.vocab.as_ref();
    let pad_id = vocab.pad_id();

    let mut losses  = Vec::new();
    let mut decoded = Vec::with_capacity(src.len());

    for i in 0..src.len() {
        let mut candidates = Vec::new();
        for neighbor in index.most_similar(i) {
            let Some(sentence) = tgt.data.get(neighbor.target_index) else {
                continue;
            };
            let content = batcher.encoded(&encode_line(&neighbor.target_content, CodecTag::Start, vocab, settings.max_len));
            let aux: Option<TokenBatch<B>> = match settings.model_type {
                ModelType::Seq2seq        => None,
                ModelType::Delete         => Some(batcher.attribute_batch(&[TARGET_ATTRIBUTE_ID])),
                ModelType::DeleteRetrieve => Some(batcher.encoded(&encode_line(
                    &neighbor.target_attribute,
                    CodecTag::Aux,
                    vocab,
                    settings.max_len,
                ))),
            };
            let tgt_input  = batcher.ids(&[word2id(sentence, CodecTag::Start, vocab, settings.max_len).ids]);
            let tgt_output = batcher.ids(&[word2id(sentence, CodecTag::End, vocab, settings.max_len).ids]);

            let out = model.forward(&content, tgt_input, aux.as_ref());
            losses.push(scalar(masked_cross_entropy(out.logits, tgt_output, pad_id)));

            let row = decode_minibatch(RETRIEVAL_DECODE_LEN, vocab.start_id(), model, &content, aux.as_ref());
            let row = tensor_rows(row).into_iter().next().unwrap_or_default();
            candidates.push(id2word(&row, vocab));
        }
        decoded.push(candidates);
    }

    Ok((mean(&losses), decoded))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::corpus::{AttributeVocab, CorpusLoader};
    use crate::domain::vocab::Vocabulary;
    use crate::ml::model::DecoderOutput;
    use burn::{backend::NdArray, tensor::TensorData};
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::Arc;

    type TestBackend = NdArray;

    /// Copies the encoder input: at decoder step j it predicts src[j + 1]
    /// (the source row starts with <s>), then </s> once the source is used up.
    struct CopyModel {
        vocab:  usize,
        end_id: usize,
    }

    impl RewriteModel<TestBackend> for CopyModel {
        fn forward(
            &self,
            src:       &TokenBatch<TestBackend>,
            tgt_input: Tensor<TestBackend, 2, Int>,
            _aux:      Option<&TokenBatch<TestBackend>>,
        ) -> DecoderOutput<TestBackend> {
            let src_rows = tensor_rows(src.ids.clone());
            let [b, l]   = tgt_input.dims();
            let mut logits = vec![0.0f32; b * l * self.vocab];
            for (i, row) in src_rows.iter().enumerate() {
                for j in 0..l {
                    let tok = row
                        .get(j + 1)
                        .copied()
                        .filter(|&t| t > 3 && src.lengths[i] > j + 1)
                        .unwrap_or(self.end_id);
                    logits[(i * l + j) * self.vocab + tok] = 10.0;
                }
            }
            let logits: Tensor<TestBackend, 3> =
                Tensor::from_data(TensorData::new(logits, [b, l, self.vocab]), &Default::default());
            let probs = burn::tensor::activation::softmax(logits.clone(), 2);
            DecoderOutput { logits, probs }
        }
    }

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn vocab() -> Arc<Vocabulary> {
        Arc::new(
            Vocabulary::from_tokens([
                "<unk>", "<pad>", "<s>", "</s>", "the", "food", "was", "great", "bad", "staff", "rude", "nice",
            ])
            .unwrap(),
        )
    }

    fn pair() -> (Corpus, Corpus) {
        let loader = CorpusLoader::new(
            vocab(),
            AttributeVocab::from_markers([("great", 1.0), ("bad", 1.0), ("rude", 1.0), ("nice", 1.0)]),
            false,
            2,
        );
        loader.paired_corpora(
            vec![toks("the food was bad"), toks("the staff"), toks("the staff was rude")],
            vec![toks("the food was great"), toks("the staff"), toks("the staff was nice")],
        )
    }

    fn settings(model_type: ModelType, batch_size: usize) -> EvalSettings {
        EvalSettings { batch_size, max_len: 10, model_type }
    }

    fn model() -> CopyModel {
        CopyModel { vocab: vocab().len(), end_id: 3 }
    }

    #[test]
    fn test_decode_dataset_restores_corpus_order() {
        let (src, tgt) = pair();
        let batcher    = MinibatchBatcher::<TestBackend>::new(Default::default());
        let mut rng    = StdRng::seed_from_u64(3);
        let records    = decode_dataset(&model(), &src, &tgt, settings(ModelType::Delete, 2), &batcher, &mut rng);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].input, toks("the food was"));
        assert_eq!(records[0].prediction, toks("the food was"));
        assert_eq!(records[0].reference, toks("the food was great"));
        assert_eq!(records[0].aux, vec!["1".to_string()]);
        assert_eq!(records[1].input, toks("the staff"));
        assert_eq!(records[2].reference, toks("the staff was nice"));
    }

    #[test]
    fn test_aux_rendering_per_model_type() {
        let (src, tgt) = pair();
        let batcher    = MinibatchBatcher::<TestBackend>::new(Default::default());
        let mut rng    = StdRng::seed_from_u64(3);

        let seq = decode_dataset(&model(), &src, &tgt, settings(ModelType::Seq2seq, 3), &batcher, &mut rng);
        assert!(seq.iter().all(|r| r.aux == vec![NO_AUX_PLACEHOLDER.to_string()]));
        assert_eq!(seq[0].input, toks("the food was bad"));

        // at test time the aux line is swapped for the nearest neighbour
        // whose attributes differ: "the staff was nice" for row 0
        let retrieve = decode_dataset(&model(), &src, &tgt, settings(ModelType::DeleteRetrieve, 3), &batcher, &mut rng);
        assert_eq!(retrieve[0].aux, toks("nice"));
    }

    #[test]
    fn test_inference_metrics_scores_copy_model() {
        let (src, tgt) = pair();
        let batcher    = MinibatchBatcher::<TestBackend>::new(Default::default());
        let mut rng    = StdRng::seed_from_u64(3);
        let report = inference_metrics(&model(), &src, &tgt, settings(ModelType::Delete, 8), &batcher, &mut rng);

        // predictions are the content with the attribute dropped
        assert_eq!(report.preds, vec!["the food was", "the staff", "the staff was"]);
        assert!((report.edit_distance - 2.0 / 3.0).abs() < 1e-9);
        // no hypothesis has four tokens, so the 4-gram total is 0
        assert_eq!(report.bleu, 0.0);
        // nothing new introduced: TP = 0 everywhere
        assert!(report.precision.abs() < 1e-9);
        assert_eq!(report.auxs, vec!["1", "1", "1"]);
    }

    #[test]
    fn test_evaluate_lpp_is_finite_and_empty_is_nan() {
        let (src, _)   = pair();
        let batcher    = MinibatchBatcher::<TestBackend>::new(Default::default());
        let mut rng    = StdRng::seed_from_u64(3);
        let loss = evaluate_lpp(&model(), &src, &src, settings(ModelType::Delete, 2), &batcher, &mut rng);
        assert!(loss.is_finite() && loss >= 0.0);

        let loader = CorpusLoader::new(vocab(), AttributeVocab::default(), false, 2);
        let (empty_src, empty_tgt) = loader.paired_corpora(vec![], vec![]);
        let loss = evaluate_lpp(&model(), &empty_src, &empty_tgt, settings(ModelType::Delete, 2), &batcher, &mut rng);
        assert!(loss.is_nan());
    }

    #[test]
    fn test_retrieval_validation_groups_candidates() {
        let (src, tgt) = pair();
        let batcher    = MinibatchBatcher::<TestBackend>::new(Default::default());
        let (loss, decoded) =
            evaluate_lpp_val(&model(), &src, &tgt, settings(ModelType::DeleteRetrieve, 1), &batcher).unwrap();

        assert!(loss.is_finite());
        assert_eq!(decoded.len(), 3);
        assert!(decoded.iter().all(|c| c.len() == 2));
        // the nearest neighbour of "the food was" is the target's own content
        assert_eq!(decoded[0][0], "the food was");
    }

    #[test]
    fn test_retrieval_validation_needs_index() {
        let (src, _) = pair();
        let batcher  = MinibatchBatcher::<TestBackend>::new(Default::default());
        assert!(evaluate_lpp_val(&model(), &src, &src, settings(ModelType::Delete, 1), &batcher).is_err());
    }

    #[test]
    fn test_score_records_identity() {
        let sent    = toks("the food was really very good");
        let records = vec![EvaluationRecord {
            input:      sent.clone(),
            prediction: sent.clone(),
            reference:  sent,
            aux:        vec![],
        }];
        let report = score_records(&records);
        assert!((report.bleu - 100.0).abs() < 1e-9);
        assert_eq!(report.edit_distance, 0.0);
    }
}
