// ============================================================
// Layer 4 — Minibatch Provider
// ============================================================
// Slices a corpus into padded id batches.
//
// Every line is wrapped as  <s> w1 .. wn </s>  (after clipping to
// max_len words) and split into a teacher-forcing pair:
//
//   input  = <s> w1 .. wn          (all but the last token)
//   output =     w1 .. wn </s>     (all but the first token)
//
// Batches are right-padded to their longest line. The content
// batch is sorted by descending length; the resulting order
// permutation is applied to the other batches and must be
// inverted (unsort) before results are shown in corpus order.

use rand::Rng;
use std::{cmp::Reverse, collections::HashSet};

use crate::data::corpus::Corpus;
use crate::domain::model_type::ModelType;
use crate::domain::traits::NeighborIndex;
use crate::domain::vocab::{Vocabulary, EMPTY_TOKEN};

/// Probability of swapping in a retrieved attribute line at train time
pub const TRAIN_SAMPLE_RATE: f64 = 0.1;
/// At test time the attribute line always comes from retrieval
pub const TEST_SAMPLE_RATE:  f64 = 1.0;

/// Attribute id used when the batch is drawn from the source side
pub const SOURCE_ATTRIBUTE_ID: usize = 0;
/// Attribute id used when the batch is drawn from the target side
pub const TARGET_ATTRIBUTE_ID: usize = 1;

// ─── PaddedBatch ──────────────────────────────────────────────────────────────
/// Host-side padded id batch with its order permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedBatch {
    pub input_ids:  Vec<Vec<usize>>,
    pub output_ids: Vec<Vec<usize>>,
    /// True (unpadded) input lengths
    pub lengths:    Vec<usize>,
    /// 1 = pad position
    pub mask:       Vec<Vec<u8>>,
    /// `order[i]` is the corpus-relative position of row `i`
    pub order:      Vec<usize>,
}

impl PaddedBatch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// How rows of a batch are ordered.
#[derive(Debug, Clone, Copy)]
pub enum RowOrder<'a> {
    /// Corpus order
    Keep,
    /// Descending input length (stable)
    SortByLength,
    /// Reuse a permutation from another batch
    Apply(&'a [usize]),
}

/// Auxiliary signal of a minibatch, one arm per model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxBatch {
    /// seq2seq
    None,
    /// delete: one attribute id per example
    AttributeIds(Vec<usize>),
    /// delete_retrieve: padded attribute token lines
    Sequence(PaddedBatch),
}

#[derive(Debug, Clone)]
pub struct Minibatch {
    pub content: PaddedBatch,
    pub aux:     AuxBatch,
    pub output:  PaddedBatch,
}

impl Minibatch {
    pub fn order(&self) -> &[usize] {
        &self.content.order
    }
}

fn batch_range(total: usize, start: usize, batch_size: usize) -> std::ops::Range<usize> {
    let start = start.min(total);
    start..(start + batch_size).min(total)
}

/// Pad a slice of token lines into a batch.
pub fn pad_lines<S: AsRef<str>>(
    lines:   &[Vec<S>],
    vocab:   &Vocabulary,
    max_len: usize,
    order:   RowOrder<'_>,
) -> PaddedBatch {
    let wrapped: Vec<Vec<usize>> = lines
        .iter()
        .map(|line| {
            std::iter::once(vocab.start_id())
                .chain(line.iter().take(max_len).map(|w| vocab.id_or_unk(w.as_ref())))
                .chain(std::iter::once(vocab.end_id()))
                .collect()
        })
        .collect();

    let lengths: Vec<usize> = wrapped.iter().map(|l| l.len() - 1).collect();
    let batch_len = lengths.iter().copied().max().unwrap_or(0);
    let pad = vocab.pad_id();

    let pad_row = |row: &[usize]| {
        let mut row = row.to_vec();
        row.resize(batch_len, pad);
        row
    };
    let mut input_ids:  Vec<Vec<usize>> = wrapped.iter().map(|l| pad_row(&l[..l.len() - 1])).collect();
    let mut output_ids: Vec<Vec<usize>> = wrapped.iter().map(|l| pad_row(&l[1..])).collect();
    let mut mask: Vec<Vec<u8>> = lengths
        .iter()
        .map(|&l| (0..batch_len).map(|j| u8::from(j >= l)).collect())
        .collect();
    let mut lengths = lengths;

    let order: Vec<usize> = match order {
        RowOrder::Keep => (0..lines.len()).collect(),
        RowOrder::SortByLength => {
            let mut idx: Vec<usize> = (0..lines.len()).collect();
            idx.sort_by_key(|&i| Reverse(lengths[i]));
            idx
        }
        RowOrder::Apply(order) => order.to_vec(),
    };

    if order.iter().enumerate().any(|(i, &o)| i != o) {
        input_ids  = order.iter().map(|&i| input_ids[i].clone()).collect();
        output_ids = order.iter().map(|&i| output_ids[i].clone()).collect();
        mask       = order.iter().map(|&i| mask[i].clone()).collect();
        lengths    = order.iter().map(|&i| lengths[i]).collect();
    }

    PaddedBatch { input_ids, output_ids, lengths, mask, order }
}

/// Batch of `lines[start .. start + batch_size]`.
pub fn get_minibatch<S: AsRef<str>>(
    lines:      &[Vec<S>],
    vocab:      &Vocabulary,
    start:      usize,
    batch_size: usize,
    max_len:    usize,
    order:      RowOrder<'_>,
) -> PaddedBatch {
    pad_lines(&lines[batch_range(lines.len(), start, batch_size)], vocab, max_len, order)
}

/// Replace attribute lines with retrieved neighbours' attributes.
///
/// Each line is replaced with probability `sample_rate` by the first
/// neighbour whose attribute set differs from the line's own
/// (`skip_self` drops the top hit, which is the line itself when the
/// index searches its own corpus). Lines with no such neighbour are
/// kept; empty lines become `<empty>`.
pub fn sample_replace<R: Rng>(
    lines:       &[Vec<String>],
    index:       &dyn NeighborIndex,
    sample_rate: f64,
    corpus_idx:  usize,
    skip_self:   bool,
    rng:         &mut R,
) -> Vec<Vec<String>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mut line = line.clone();
            if rng.gen::<f64>() < sample_rate {
                let own: HashSet<&str> = line.iter().map(String::as_str).collect();
                let replacement: Option<Vec<String>> = index
                    .most_similar(corpus_idx + i)
                    .iter()
                    .skip(usize::from(skip_self))
                    .map(|n| n.target_attribute.split_whitespace().collect::<Vec<_>>())
                    .find(|attrs| attrs.iter().copied().collect::<HashSet<_>>() != own)
                    .map(|attrs| attrs.into_iter().map(str::to_string).collect());
                if let Some(replacement) = replacement {
                    line = replacement;
                }
            }
            if line.is_empty() {
                line.push(EMPTY_TOKEN.to_string());
            }
            line
        })
        .collect()
}

/// Build one minibatch for `model_type`.
///
/// Training (`is_test == false`) flips a fair coin between the two
/// corpora and autoencodes the chosen one; test time reads content
/// from `src` and targets from `tgt`.
#[allow(clippy::too_many_arguments)]
pub fn minibatch<R: Rng>(
    src:        &Corpus,
    tgt:        &Corpus,
    start:      usize,
    batch_size: usize,
    max_len:    usize,
    model_type: ModelType,
    is_test:    bool,
    rng:        &mut R,
) -> Minibatch {
    let (in_corpus, out_corpus, attribute_id) = if is_test {
        (src, tgt, TARGET_ATTRIBUTE_ID)
    } else if rng.gen_bool(0.5) {
        (src, src, SOURCE_ATTRIBUTE_ID)
    } else {
        (tgt, tgt, TARGET_ATTRIBUTE_ID)
    };
    let vocab = in_corpus.vocab.as_ref();

    match model_type {
        ModelType::Delete => {
            let content = get_minibatch(&in_corpus.content, vocab, start, batch_size, max_len, RowOrder::SortByLength);
            let output  = get_minibatch(&out_corpus.data, vocab, start, batch_size, max_len, RowOrder::Apply(&content.order));
            let aux     = AuxBatch::AttributeIds(vec![attribute_id; output.len()]);
            Minibatch { content, aux, output }
        }
        ModelType::DeleteRetrieve => {
            let content = get_minibatch(&in_corpus.content, vocab, start, batch_size, max_len, RowOrder::SortByLength);
            let range   = batch_range(out_corpus.attribute.len(), start, batch_size);
            let lines   = match &out_corpus.searcher {
                Some(index) => {
                    let rate = if is_test { TEST_SAMPLE_RATE } else { TRAIN_SAMPLE_RATE };
                    sample_replace(&out_corpus.attribute[range.clone()], index, rate, range.start, !is_test, rng)
                }
                None => out_corpus.attribute[range].to_vec(),
            };
            let aux    = pad_lines(&lines, vocab, max_len, RowOrder::Apply(&content.order));
            let output = get_minibatch(&out_corpus.data, vocab, start, batch_size, max_len, RowOrder::Apply(&content.order));
            Minibatch { content, aux: AuxBatch::Sequence(aux), output }
        }
        ModelType::Seq2seq => {
            let content = get_minibatch(&src.data, vocab, start, batch_size, max_len, RowOrder::SortByLength);
            let output  = get_minibatch(&tgt.data, vocab, start, batch_size, max_len, RowOrder::Apply(&content.order));
            Minibatch { content, aux: AuxBatch::None, output }
        }
    }
}

/// Undo a batch permutation: row `i` goes back to position `order[i]`.
pub fn unsort<T>(items: Vec<T>, order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = (0..items.len()).map(|_| None).collect();
    for (item, &origin) in items.into_iter().zip(order) {
        if let Some(slot) = slots.get_mut(origin) {
            *slot = Some(item);
        }
    }
    slots.into_iter().flatten().collect()
}
