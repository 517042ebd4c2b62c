// ============================================================
// Layer 6 - Tokenizer Store
// ============================================================
// Turns a Vocabulary into a HuggingFace `tokenizers` WordLevel
// tokenizer, persists both, and wraps encoding/decoding.
//
// The tokenizer JSON is written by hand and loaded back with
// Tokenizer::from_file; this avoids the trainer/ModelWrapper type
// mismatch of train_from_files in tokenizers 0.15.
//
// Pre-tokenization is WhitespaceSplit, not Whitespace: sentences
// have already been normalised, and Whitespace would split
// "don't" into three tokens that the vocabulary never counted.
//
// Files:
//   vocab.json       tokens in id order
//   tokenizer.json   WordLevel tokenizer over the same ids

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};
use std::{fs, path::PathBuf};
use tokenizers::Tokenizer;

use crate::domain::traits::Persistable;
use crate::domain::vocabulary::{Vocabulary, PAD_ID, PAD_TOKEN, UNK_ID, UNK_TOKEN};

const VOCAB_FILE:     &str = "vocab.json";
const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist `vocab` and the tokenizer derived from it, then load
    /// the tokenizer back from disk.
    pub fn save(&self, vocab: &Vocabulary) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        vocab.save(&self.dir.join(VOCAB_FILE))?;

        let tok_path = self.dir.join(TOKENIZER_FILE);
        fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json(vocab))?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!(
            "Tokenizer built with {} entries, saved to '{}'",
            vocab.len(),
            tok_path.display()
        );

        self.load_tokenizer()
    }

    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        let path = self.dir.join(TOKENIZER_FILE);
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    pub fn load_vocabulary(&self) -> Result<Vocabulary> {
        Vocabulary::load(&self.dir.join(VOCAB_FILE))
    }
}

/// Encode one normalised sentence to vocabulary ids
pub fn encode(tokenizer: &Tokenizer, sentence: &str) -> Result<Vec<u32>> {
    let encoding = tokenizer
        .encode(sentence, false)
        .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
    Ok(encoding.get_ids().to_vec())
}

pub fn decode(tokenizer: &Tokenizer, ids: &[u32]) -> Result<String> {
    tokenizer
        .decode(ids, true)
        .map_err(|e| anyhow!("Decode error: {e}"))
}

fn tokenizer_json(vocab: &Vocabulary) -> Value {
    let mut entries = Map::with_capacity(vocab.len());
    for (id, token) in vocab.tokens().iter().enumerate() {
        entries.insert(token.clone(), json!(id));
    }

    let special = |id: u32, content: &str| {
        json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };

    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [special(PAD_ID, PAD_TOKEN), special(UNK_ID, UNK_TOKEN)],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "WhitespaceSplit" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": Value::Object(entries),
            "unk_token": UNK_TOKEN
        }
    })
}
