// ============================================================
// Layer 3 - Document Domain Type
// ============================================================
// One work of the literary corpus as it was read from disk.
// The text is raw: cleaning and sentence splitting happen in
// the data layer.

use serde::{Deserialize, Serialize};

/// A raw document loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// The file name, kept so samples can be traced to their work
    pub source: String,

    /// The full text content of the document before any cleaning
    pub text: String,
}

impl Document {
    /// Create a new Document with a source name and text content.
    ///
    /// Example:
    ///   let doc = Document::new("persuasion.txt", "Sir Walter Elliot...");
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text:   text.into(),
        }
    }

    /// Number of whitespace-separated words in the raw text
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
