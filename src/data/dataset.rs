use burn::data::dataset::Dataset;
use std::collections::BTreeMap;

use crate::domain::sample::TokenSequence;

/// In-memory collection of unpadded token sequences.
pub struct SequenceDataset {
    samples: Vec<TokenSequence>,
}

impl SequenceDataset {
    pub fn new(samples: Vec<TokenSequence>) -> Self { Self { samples } }

    /// Group samples by the document they came from, in task-id order.
    pub fn tasks(&self) -> Vec<(usize, Vec<TokenSequence>)> {
        let mut grouped: BTreeMap<usize, Vec<TokenSequence>> = BTreeMap::new();
        for sample in &self.samples {
            grouped.entry(sample.task).or_default().push(sample.clone());
        }
        grouped.into_iter().collect()
    }
}

impl Dataset<TokenSequence> for SequenceDataset {
    fn get(&self, index: usize) -> Option<TokenSequence> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
