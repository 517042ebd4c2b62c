// ============================================================
// Layer 4 - Corpus Loader
// ============================================================
// Loads the literary corpus: every `.txt` file in a directory
// becomes one Document. Files are visited in file-name order so
// that document indices (and therefore task ids) are stable
// between runs.
//
// A file that cannot be read or is not valid UTF-8 is logged
// and skipped; it never aborts the whole load.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::document::Document;
use crate::domain::traits::DocumentSource;

/// Loads all .txt files from a given directory.
pub struct TextCorpusLoader {
    dir: PathBuf,
}

impl TextCorpusLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DocumentSource for TextCorpusLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        if !self.dir.exists() {
            tracing::warn!(
                "Corpus directory '{}' does not exist, returning empty corpus",
                self.dir.display()
            );
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .collect();
        paths.sort();

        let mut docs = Vec::with_capacity(paths.len());
        for path in &paths {
            match load_single_text(path) {
                Ok(doc) => {
                    tracing::debug!("Loaded: {} ({} words)", doc.source, doc.word_count());
                    docs.push(doc);
                }
                Err(e) => {
                    tracing::warn!("Skipping '{}': {:#}", path.display(), e);
                }
            }
        }

        tracing::info!("Successfully loaded {} documents", docs.len());
        Ok(docs)
    }
}

fn load_single_text(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(Document::new(source, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_gives_empty_corpus() {
        let loader = TextCorpusLoader::new("/definitely/not/a/corpus");
        assert!(loader.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_loads_only_txt_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second work").unwrap();
        fs::write(dir.path().join("a.txt"), "first work").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let docs = TextCorpusLoader::new(dir.path()).load_all().unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(docs[0].text, "first work");
    }

    #[test]
    fn test_invalid_utf8_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("good.txt"), "fine").unwrap();

        let docs = TextCorpusLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "good.txt");
    }
}
