// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Loads the vocabulary file, or builds it from the training
// corpus when the configured file does not exist yet.
//
// File format: one token per line. The reserved tokens come
// first (<unk>, <pad>, <s>, </s>), then corpus words ordered by
// descending frequency, ties alphabetical.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::vocab::{Vocabulary, RESERVED_TOKENS};

pub struct VocabStore {
    path: PathBuf,
}

impl VocabStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the existing vocabulary or build a new one from `lines`
    pub fn load_or_build(&self, lines: &[Vec<String>]) -> Result<Vocabulary> {
        if self.path.exists() {
            tracing::info!("Loading vocabulary from '{}'", self.path.display());
            self.load()
        } else {
            tracing::info!("Building vocabulary from {} training sentences", lines.len());
            self.build_and_save(lines)
        }
    }

    pub fn load(&self) -> Result<Vocabulary> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read vocabulary '{}'", self.path.display()))?;
        let tokens = text.lines().map(str::trim).filter(|t| !t.is_empty());
        Vocabulary::from_tokens(tokens)
            .with_context(|| format!("Invalid vocabulary '{}'", self.path.display()))
    }

    fn build_and_save(&self, lines: &[Vec<String>]) -> Result<Vocabulary> {
        let tokens = frequency_ordered(lines);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, tokens.join("\n") + "\n")
            .with_context(|| format!("Cannot write vocabulary '{}'", self.path.display()))?;

        tracing::info!("Vocabulary built with {} tokens, saved to '{}'", tokens.len(), self.path.display());
        Vocabulary::from_tokens(tokens)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn frequency_ordered(lines: &[Vec<String>]) -> Vec<String> {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for word in lines.iter().flatten() {
        if !RESERVED_TOKENS.contains(&word.as_str()) {
            *freq.entry(word.as_str()).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(&str, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    RESERVED_TOKENS
        .iter()
        .copied()
        .chain(words.into_iter().map(|(w, _)| w))
        .map(str::to_string)
        .collect()
}
