// ============================================================
// Layer 3 - Token Sequences and Corpus Splits
// ============================================================
// A tokenised sentence is stored exactly as long as it is.
// Padding is a batching concern and only happens when the
// batcher stacks sequences into a tensor.

use serde::{Deserialize, Serialize};

/// One tokenised sample, never padded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSequence {
    /// Vocabulary ids in reading order
    pub ids: Vec<u32>,

    /// Index of the document this sequence came from.
    /// Meta-learning treats every document as one task.
    pub task: usize,
}

impl TokenSequence {
    pub fn new(ids: Vec<u32>, task: usize) -> Self {
        Self { ids, task }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The three-way train / validation / test division of a corpus.
///
/// `train.len() + validation.len() + test.len()` always equals the
/// number of samples the split was made from.
#[derive(Debug, Clone, Default)]
pub struct CorpusSplit<T> {
    pub train:      Vec<T>,
    pub validation: Vec<T>,
    pub test:       Vec<T>,
}

impl<T> CorpusSplit<T> {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_total_counts_all_parts() {
        let split = CorpusSplit {
            train:      vec![1, 2, 3],
            validation: vec![4],
            test:       vec![5, 6],
        };
        assert_eq!(split.total(), 6);
    }

    #[test]
    fn test_sequence_len() {
        let seq = TokenSequence::new(vec![5, 9, 2], 0);
        assert_eq!(seq.len(), 3);
        assert!(!seq.is_empty());
    }
}
