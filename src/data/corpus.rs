// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads line-per-sentence text files and splits every sentence
// into content words and attribute markers.
//
// A Corpus holds three parallel views of the same sentences:
//   data      → full token sequence
//   content   → tokens that are not attribute markers
//   attribute → the removed markers, in sentence order
//
// Attribute vocabulary file format, one marker per line:
//   marker            (score defaults to 1.0)
//   marker<TAB>score
// Markers may be n-grams ("not good") when n-gram extraction is on.

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path, sync::Arc};

use crate::data::retrieval::CorpusSearcher;
use crate::domain::vocab::Vocabulary;

/// Longest n-gram considered as an attribute marker
const MAX_MARKER_ORDER: usize = 4;

// ─── AttributeVocab ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct AttributeVocab {
    markers: HashMap<String, f64>,
}

impl AttributeVocab {
    pub fn from_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self { markers: markers.into_iter().map(|(m, s)| (m.into(), s)).collect() }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read attribute vocab '{}'", path.display()))?;

        let mut markers = HashMap::new();
        for line in text.lines() {
            let mut fields = line.split('\t');
            let marker = fields.next().unwrap_or("").trim();
            if marker.is_empty() {
                continue;
            }
            let score = fields
                .next()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(1.0);
            markers.insert(marker.to_string(), score);
        }

        tracing::debug!("Loaded {} attribute markers from '{}'", markers.len(), path.display());
        Ok(Self { markers })
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Split a sentence into (content, attribute markers).
    pub fn extract(&self, line: &[String], use_ngrams: bool) -> (Vec<String>, Vec<String>) {
        if use_ngrams {
            self.extract_ngrams(line)
        } else {
            line.iter()
                .cloned()
                .partition(|tok| !self.markers.contains_key(tok))
        }
    }

    /// Greedy n-gram removal: candidates present in the vocabulary are
    /// deleted highest score first (longer n-grams win ties), each one
    /// at its first still-intact occurrence.
    fn extract_ngrams(&self, line: &[String]) -> (Vec<String>, Vec<String>) {
        let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
        for n in 1..=MAX_MARKER_ORDER.min(line.len()) {
            for (start, gram) in line.windows(n).enumerate() {
                if let Some(&score) = self.markers.get(&gram.join(" ")) {
                    candidates.push((start, n, score));
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then(b.1.cmp(&a.1))
                .then(a.0.cmp(&b.0))
        });

        let mut removed = vec![false; line.len()];
        let mut found: Vec<(usize, String)> = Vec::new();
        for (start, n, _) in candidates {
            let span = start..start + n;
            if removed[span.clone()].iter().any(|&r| r) {
                continue;
            }
            removed[span.clone()].iter_mut().for_each(|r| *r = true);
            found.push((start, line[span].join(" ")));
        }
        found.sort_by_key(|(start, _)| *start);

        let content = line
            .iter()
            .zip(&removed)
            .filter(|&(_, &r)| !r)
            .map(|(tok, _)| tok.clone())
            .collect();
        let attributes = found
            .into_iter()
            .flat_map(|(_, marker)| marker.split(' ').map(str::to_string).collect::<Vec<_>>())
            .collect();
        (content, attributes)
    }
}

// ─── Corpus ───────────────────────────────────────────────────────────────────
pub struct Corpus {
    pub data:      Vec<Vec<String>>,
    pub content:   Vec<Vec<String>>,
    pub attribute: Vec<Vec<String>>,
    pub vocab:     Arc<Vocabulary>,
    /// Nearest-neighbour index keyed by example index
    pub searcher:  Option<CorpusSearcher>,
}

impl Corpus {
    pub fn from_lines(
        lines:      Vec<Vec<String>>,
        attributes: &AttributeVocab,
        use_ngrams: bool,
        vocab:      Arc<Vocabulary>,
    ) -> Self {
        let (content, attribute) = lines
            .iter()
            .map(|line| attributes.extract(line, use_ngrams))
            .unzip();
        Self { data: lines, content, attribute, vocab, searcher: None }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_strings(&self) -> Vec<String> {
        self.content.iter().map(|c| c.join(" ")).collect()
    }

    pub fn attribute_strings(&self) -> Vec<String> {
        self.attribute.iter().map(|a| a.join(" ")).collect()
    }
}

/// Read a text file as whitespace-tokenised lines.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus '{}'", path.display()))?;
    Ok(text
        .lines()
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect())
}

// ─── CorpusLoader ─────────────────────────────────────────────────────────────
/// Builds training and paired evaluation corpora that share one
/// vocabulary and one attribute vocabulary.
pub struct CorpusLoader {
    vocab:         Arc<Vocabulary>,
    attributes:    AttributeVocab,
    use_ngrams:    bool,
    num_neighbors: usize,
}

impl CorpusLoader {
    pub fn new(
        vocab:         Arc<Vocabulary>,
        attributes:    AttributeVocab,
        use_ngrams:    bool,
        num_neighbors: usize,
    ) -> Self {
        Self { vocab, attributes, use_ngrams, num_neighbors }
    }

    /// Training corpus. With `with_index` the corpus gets a searcher over
    /// its own content (every example is its own top match).
    pub fn train_corpus(&self, lines: Vec<Vec<String>>, with_index: bool) -> Corpus {
        let mut corpus = Corpus::from_lines(lines, &self.attributes, self.use_ngrams, self.vocab.clone());
        if with_index {
            let content = corpus.content_strings();
            corpus.searcher = Some(CorpusSearcher::new(
                content.clone(),
                content,
                corpus.attribute_strings(),
                self.num_neighbors,
            ));
        }
        tracing::info!("Training corpus: {} sentences", corpus.len());
        corpus
    }

    /// Line-aligned (source, target) pair. The target corpus is indexed
    /// for queries coming from the source content. Both sides are cut
    /// to the shorter one.
    pub fn paired_corpora(&self, mut src: Vec<Vec<String>>, mut tgt: Vec<Vec<String>>) -> (Corpus, Corpus) {
        if src.len() != tgt.len() {
            tracing::warn!(
                "Source has {} lines but target has {}; dropping the unpaired tail",
                src.len(),
                tgt.len()
            );
            let paired = src.len().min(tgt.len());
            src.truncate(paired);
            tgt.truncate(paired);
        }
        let src = Corpus::from_lines(src, &self.attributes, self.use_ngrams, self.vocab.clone());
        let mut tgt = Corpus::from_lines(tgt, &self.attributes, self.use_ngrams, self.vocab.clone());
        tgt.searcher = Some(CorpusSearcher::new(
            src.content_strings(),
            tgt.content_strings(),
            tgt.attribute_strings(),
            self.num_neighbors,
        ));
        (src, tgt)
    }

    pub fn load_pair(&self, src_path: impl AsRef<Path>, tgt_path: impl AsRef<Path>) -> Result<(Corpus, Corpus)> {
        Ok(self.paired_corpora(read_lines(src_path)?, read_lines(tgt_path)?))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::NeighborIndex;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_tokens(["<unk>", "<pad>", "<s>", "</s>"]).unwrap())
    }

    #[test]
    fn test_unigram_extraction() {
        let attrs = AttributeVocab::from_markers([("great", 1.0), ("terrible", 1.0)]);
        let (content, markers) = attrs.extract(&toks("the food was great"), false);
        assert_eq!(content, toks("the food was"));
        assert_eq!(markers, toks("great"));
    }

    #[test]
    fn test_ngram_extraction_prefers_high_scores() {
        let attrs = AttributeVocab::from_markers([("not good", 2.0), ("good", 1.5)]);
        let (content, markers) = attrs.extract(&toks("it was not good at all"), true);
        assert_eq!(content, toks("it was at all"));
        assert_eq!(markers, toks("not good"));
    }

    #[test]
    fn test_load_attribute_file_with_scores() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("attrs");
        fs::write(&path, "great\t3.5\nawful\n\n").unwrap();
        let attrs = AttributeVocab::load(&path).unwrap();
        assert_eq!(attrs.len(), 2);
        let (_, markers) = attrs.extract(&toks("awful and great"), false);
        assert_eq!(markers, toks("awful great"));
    }

    #[test]
    fn test_paired_corpora_index_target() {
        let loader = CorpusLoader::new(vocab(), AttributeVocab::from_markers([("rude", 1.0), ("kind", 1.0)]), false, 2);
        let (src, tgt) = loader.paired_corpora(
            vec![toks("the staff was rude"), toks("the soup was cold")],
            vec![toks("the staff was kind"), toks("the soup was warm")],
        );
        assert_eq!(src.content[0], toks("the staff was"));
        let hits = tgt.searcher.as_ref().unwrap().most_similar(0);
        assert_eq!(hits[0].target_index, 0);
        assert_eq!(hits[0].target_attribute, "kind");
    }

    #[test]
    fn test_unequal_pair_is_cut_to_shorter_side() {
        let loader = CorpusLoader::new(vocab(), AttributeVocab::default(), false, 2);
        let (src, tgt) = loader.paired_corpora(vec![toks("a"), toks("a b"), toks("b")], vec![toks("a"), toks("b")]);
        assert_eq!(src.len(), 2);
        assert_eq!(tgt.len(), 2);
        assert_eq!(src.data[1], toks("a b"));
        assert!(tgt.searcher.as_ref().unwrap().most_similar(1).iter().all(|n| n.target_index < 2));
    }

    #[test]
    fn test_read_lines_keeps_empty_lines() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus");
        fs::write(&path, "a b\n\nc\n").unwrap();
        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec![toks("a b"), vec![], toks("c")]);
    }
}
