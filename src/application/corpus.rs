// ============================================================
// Layer 2 - Corpus Preparation
// ============================================================
// Shared first half of every workflow:
//
//   Step 1: Load .txt files              (Layer 4 - data)
//   Step 2: Clean + split sentences      (Layer 4 - data)
//   Step 3: Build vocabulary             (Layer 3 - domain)
//   Step 4: Save vocab + tokenizer       (Layer 6 - infra)
//   Step 5: Encode sentences             (Layer 6 - infra)
//   Step 6: Cut into model-sized windows (Layer 4 - data)
//   Step 7: Train/validation/test split  (Layer 4 - data)
//
// Each document's index becomes the task id of all sequences cut
// from it, which is what meta-learning groups by.
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::{
    chunker::Chunker,
    loader::TextCorpusLoader,
    preprocessor::Preprocessor,
    splitter::split_three_way,
};
use crate::domain::{
    sample::{CorpusSplit, TokenSequence},
    traits::DocumentSource,
    vocabulary::Vocabulary,
};
use crate::infra::tokenizer_store::{encode, TokenizerStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub corpus_dir:          String,
    pub checkpoint_dir:      String,
    pub vocab_size:          usize,
    pub max_seq_len:         usize,
    pub train_fraction:      f64,
    pub validation_fraction: f64,
    pub seed:                u64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            corpus_dir:          "data/corpus".to_string(),
            checkpoint_dir:      "checkpoints".to_string(),
            vocab_size:          10_000,
            max_seq_len:         64,
            train_fraction:      0.8,
            validation_fraction: 0.1,
            seed:                42,
        }
    }
}

/// The encoded corpus, ready to split
pub struct PreparedCorpus {
    pub vocab:     Vocabulary,
    pub tokenizer: Tokenizer,
    pub documents: usize,
    pub sentences: usize,
    pub sequences: Vec<TokenSequence>,
}

impl PreparedCorpus {
    pub fn token_count(&self) -> usize {
        self.sequences.iter().map(TokenSequence::len).sum()
    }

    pub fn split(self, cfg: &CorpusConfig) -> Result<CorpusSplit<TokenSequence>> {
        split_three_way(self.sequences, cfg.train_fraction, cfg.validation_fraction, cfg.seed)
    }
}

pub fn prepare_corpus(cfg: &CorpusConfig) -> Result<PreparedCorpus> {
    ensure!(cfg.max_seq_len >= 1, "max_seq_len must be at least 1");

    // ── Step 1: Load all .txt documents ──────────────────────────────────────
    tracing::info!("Loading .txt files from '{}'", cfg.corpus_dir);
    let docs = TextCorpusLoader::new(&cfg.corpus_dir).load_all()?;
    ensure!(!docs.is_empty(), "No readable .txt documents in '{}'", cfg.corpus_dir);
    tracing::info!("Loaded {} documents", docs.len());

    // ── Step 2: Clean, split, and normalise sentences ─────────────────────────
    let preprocessor = Preprocessor::new();
    let per_doc: Vec<Vec<String>> = docs.iter().map(|d| preprocessor.process(&d.text)).collect();
    let sentences: usize = per_doc.iter().map(Vec::len).sum();
    tracing::info!("Extracted {} sentences", sentences);

    // ── Step 3: Frequency-ranked vocabulary over the whole corpus ─────────────
    let words = per_doc.iter().flatten().flat_map(|s| s.split_whitespace());
    let vocab = Vocabulary::build(words, cfg.vocab_size)?;
    tracing::info!("Vocabulary: {} entries (cap {})", vocab.len(), cfg.vocab_size);

    // ── Step 4: Persist vocabulary and tokenizer ──────────────────────────────
    let tokenizer = TokenizerStore::new(&cfg.checkpoint_dir).save(&vocab)?;

    // ── Steps 5-6: Encode and window ──────────────────────────────────────────
    // A window holds max_seq_len + 1 tokens: inputs plus the shifted target.
    let window  = cfg.max_seq_len + 1;
    let chunker = Chunker::new(window, cfg.max_seq_len / 4)?;

    let mut sequences = Vec::new();
    for (task, doc_sentences) in per_doc.iter().enumerate() {
        for sentence in doc_sentences {
            let ids = match encode(&tokenizer, sentence) {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!("Skipping sentence in '{}': {:#}", docs[task].source, e);
                    continue;
                }
            };
            sequences.extend(
                chunker
                    .chunk(&ids)
                    .into_iter()
                    .filter(|w| w.len() >= 2)
                    .map(|w| TokenSequence::new(w.to_vec(), task)),
            );
        }
    }
    ensure!(!sequences.is_empty(), "Corpus produced no sequences of two or more tokens");

    tracing::info!("Built {} sequences", sequences.len());

    Ok(PreparedCorpus {
        vocab,
        tokenizer,
        documents: docs.len(),
        sentences,
        sequences,
    })
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
// `prepare` on its own: build and save the tokenizer, report what
// training would see.
pub struct PrepareUseCase {
    config: CorpusConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    pub documents:  usize,
    pub sentences:  usize,
    pub vocab_size: usize,
    pub tokens:     usize,
    pub train:      usize,
    pub validation: usize,
    pub test:       usize,
}

impl PrepareUseCase {
    pub fn new(config: CorpusConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<CorpusStats> {
        let corpus = prepare_corpus(&self.config)?;
        let (documents, sentences, vocab_size, tokens) =
            (corpus.documents, corpus.sentences, corpus.vocab.len(), corpus.token_count());
        let split = corpus.split(&self.config)?;

        Ok(CorpusStats {
            documents,
            sentences,
            vocab_size,
            tokens,
            train:      split.train.len(),
            validation: split.validation.len(),
            test:       split.test.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    fn write_corpus(dir: &Path) {
        fs::write(
            dir.join("a_austen.txt"),
            "It is a truth universally acknowledged, that a single man in possession \
             of a good fortune, must be in want of a wife.\n\nHowever little known the \
             feelings or views of such a man may be!",
        )
        .unwrap();
        fs::write(
            dir.join("b_dickens.txt"),
            "It was the best of times, it was the worst of times. It was the age of \
             wisdom; it was the age of foolishness.",
        )
        .unwrap();
    }

    fn config(corpus: &Path, ckpt: &Path) -> CorpusConfig {
        CorpusConfig {
            corpus_dir:     corpus.display().to_string(),
            checkpoint_dir: ckpt.display().to_string(),
            vocab_size:     40,
            max_seq_len:    8,
            ..CorpusConfig::default()
        }
    }

    #[test]
    fn test_prepare_encodes_every_document() {
        let corpus = tempfile::tempdir().unwrap();
        let ckpt   = tempfile::tempdir().unwrap();
        write_corpus(corpus.path());

        let prepared = prepare_corpus(&config(corpus.path(), ckpt.path())).unwrap();

        assert_eq!(prepared.documents, 2);
        assert_eq!(prepared.sentences, 5);
        assert!(prepared.vocab.contains("was"));
        assert!(prepared.vocab.len() <= 40);
        assert!(prepared.sequences.iter().all(|s| s.len() >= 2 && s.len() <= 9));
        assert!(prepared.sequences.iter().any(|s| s.task == 0));
        assert!(prepared.sequences.iter().any(|s| s.task == 1));
        assert!(ckpt.path().join("tokenizer.json").exists());
        assert!(ckpt.path().join("vocab.json").exists());
    }

    #[test]
    fn test_empty_corpus_is_an_error() {
        let corpus = tempfile::tempdir().unwrap();
        let ckpt   = tempfile::tempdir().unwrap();
        assert!(prepare_corpus(&config(corpus.path(), ckpt.path())).is_err());
    }

    #[test]
    fn test_stats_splits_add_up() {
        let corpus = tempfile::tempdir().unwrap();
        let ckpt   = tempfile::tempdir().unwrap();
        write_corpus(corpus.path());
        let cfg = config(corpus.path(), ckpt.path());

        let sequences = prepare_corpus(&cfg).unwrap().sequences.len();
        let stats     = PrepareUseCase::new(cfg).execute().unwrap();

        assert_eq!(stats.documents, 2);
        assert_eq!(stats.train + stats.validation + stats.test, sequences);
    }
}
