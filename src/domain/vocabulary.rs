// ============================================================
// Layer 3 - Vocabulary
// ============================================================
// A token -> index mapping built by frequency ranking.
//
// Layout of the index space:
//   0        [PAD]   used only when the batcher pads a batch
//   1        [UNK]   any word outside the vocabulary
//   2..len   corpus words, most frequent first
//
// Ties in frequency are broken alphabetically so that the same
// corpus always yields the same vocabulary.
//
// Reference: Rust Book §8 (Hash Maps)

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::traits::Persistable;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;

/// Number of indices reserved ahead of the corpus words
pub const RESERVED: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Tokens in index order; position == id
    tokens: Vec<String>,

    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Build a vocabulary of at most `max_size` entries (reserved
    /// entries included) from an iterator of already-normalised words.
    pub fn build<'a, I>(words: I, max_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ensure!(
            max_size >= RESERVED,
            "vocabulary size must be at least {RESERVED} to hold {PAD_TOKEN} and {UNK_TOKEN}, got {max_size}"
        );

        let mut freq: HashMap<&str, usize> = HashMap::new();
        for word in words {
            if word.is_empty() || word == PAD_TOKEN || word == UNK_TOKEN {
                continue;
            }
            *freq.entry(word).or_insert(0) += 1;
        }

        let mut ranked: Vec<(&str, usize)> = freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_size - RESERVED);

        let tokens = [PAD_TOKEN, UNK_TOKEN]
            .into_iter()
            .chain(ranked.into_iter().map(|(w, _)| w))
            .map(str::to_string)
            .collect();

        Ok(Self::from_tokens(tokens))
    }

    fn from_tokens(tokens: Vec<String>) -> Self {
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { tokens, index }
    }

    /// Id of `token`, or `UNK_ID` when it is not in the vocabulary
    pub fn id(&self, token: &str) -> u32 {
        self.index.get(token).copied().unwrap_or(UNK_ID)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens in id order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl Persistable for Vocabulary {
    fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.tokens)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))
    }

    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vocabulary from '{}'", path.display()))?;
        let tokens: Vec<String> = serde_json::from_str(&json)?;
        ensure!(
            tokens.first().map(String::as_str) == Some(PAD_TOKEN)
                && tokens.get(1).map(String::as_str) == Some(UNK_TOKEN),
            "vocabulary '{}' does not start with the reserved tokens",
            path.display()
        );
        Ok(Self::from_tokens(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    #[test]
    fn test_reserved_ids_are_fixed() {
        let v = Vocabulary::build(words("the cat"), 10).unwrap();
        assert_eq!(v.id(PAD_TOKEN), PAD_ID);
        assert_eq!(v.id(UNK_TOKEN), UNK_ID);
        assert_eq!(v.token(0), Some(PAD_TOKEN));
        assert_eq!(v.token(1), Some(UNK_TOKEN));
    }

    #[test]
    fn test_order_follows_descending_frequency() {
        let v = Vocabulary::build(words("b a a c a b"), 10).unwrap();
        assert_eq!(&v.tokens()[2..], &["a", "b", "c"]);
    }

    #[test]
    fn test_ties_break_alphabetically() {
        let v = Vocabulary::build(words("pear apple fig"), 10).unwrap();
        assert_eq!(&v.tokens()[2..], &["apple", "fig", "pear"]);
    }

    #[test]
    fn test_cap_drops_rare_words() {
        let v = Vocabulary::build(words("sea sea sea ship ship whale"), 4).unwrap();
        assert_eq!(v.len(), 4);
        assert!(v.contains("sea"));
        assert!(v.contains("ship"));
        assert!(!v.contains("whale"));
        assert_eq!(v.id("whale"), UNK_ID);
    }

    #[test]
    fn test_indices_are_unique() {
        let v = Vocabulary::build(words("a b c d e f a b"), 100).unwrap();
        let mut ids: Vec<u32> = v.tokens().iter().map(|t| v.id(t)).collect();
        ids.dedup();
        assert_eq!(ids, (0..v.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_small_capacity_is_rejected() {
        assert!(Vocabulary::build(words("a"), 1).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        let v    = Vocabulary::build(words("emma knightley emma"), 10).unwrap();
        v.save(&path).unwrap();

        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded.tokens(), v.tokens());
        assert_eq!(loaded.id("knightley"), v.id("knightley"));
    }
}
