// ============================================================
// Layer 4 - Language-Model Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<TokenSequence>
// into next-token prediction tensors.
//
// Sequences are stored unpadded, so this is the one place where
// padding happens:
//   1. every sequence is truncated to max_seq_len + 1 tokens
//   2. the batch is padded with PAD_ID to its longest member
//      (not to max_seq_len, short batches stay short)
//   3. inputs  = tokens[.., 0..len-1]
//      targets = tokens[.., 1..len]
//
// Targets that are PAD_ID are ignored by the loss.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::{sample::TokenSequence, vocabulary::PAD_ID};

#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// Model inputs, shape [batch_size, seq_len]
    pub inputs: Tensor<B, 2, Int>,

    /// Next-token targets, shape [batch_size, seq_len]
    pub targets: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct LmBatcher {
    max_seq_len: usize,
}

impl LmBatcher {
    pub fn new(max_seq_len: usize) -> Self {
        Self { max_seq_len }
    }

    /// Pad a set of sequences into one row-major buffer.
    /// Returns (flat_ids, batch_size, row_len).
    pub fn pad(&self, items: &[TokenSequence]) -> (Vec<i32>, usize, usize) {
        let limit   = self.max_seq_len + 1;
        let row_len = items
            .iter()
            .map(|s| s.len().min(limit))
            .max()
            .unwrap_or(0)
            .max(2);

        let mut flat = Vec::with_capacity(items.len() * row_len);
        for sample in items {
            let kept = &sample.ids[..sample.len().min(limit)];
            flat.extend(kept.iter().map(|&id| id as i32));
            flat.extend(std::iter::repeat(PAD_ID as i32).take(row_len - kept.len()));
        }

        (flat, items.len(), row_len)
    }

    /// Non-PAD targets `collate` produces for `items`.
    pub fn target_count(&self, items: &[TokenSequence]) -> usize {
        let limit = self.max_seq_len + 1;
        items
            .iter()
            .map(|s| s.len().min(limit).saturating_sub(1))
            .sum()
    }
}

impl<B: Backend> Batcher<B, TokenSequence, LmBatch<B>> for LmBatcher {
    fn batch(&self, items: Vec<TokenSequence>, device: &B::Device) -> LmBatch<B> {
        self.collate(&items, device)
    }
}

impl LmBatcher {
    /// Same as `Batcher::batch`, callable without naming the trait
    pub fn collate<B: Backend>(&self, items: &[TokenSequence], device: &B::Device) -> LmBatch<B> {
        let (flat, batch_size, row_len) = self.pad(items);

        let tokens = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device)
            .reshape([batch_size, row_len]);

        let inputs  = tokens.clone().slice([0..batch_size, 0..row_len - 1]);
        let targets = tokens.slice([0..batch_size, 1..row_len]);

        LmBatch { inputs, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_pads_to_longest_in_batch() {
        let batcher = LmBatcher::new(16);
        let items = vec![
            TokenSequence::new(vec![5, 6, 7, 8], 0),
            TokenSequence::new(vec![9, 10], 0),
        ];
        let (flat, b, len) = batcher.pad(&items);
        assert_eq!((b, len), (2, 4));
        assert_eq!(flat, vec![5, 6, 7, 8, 9, 10, 0, 0]);
    }

    #[test]
    fn test_truncates_to_max_seq_len_plus_one() {
        let batcher = LmBatcher::new(3);
        let items = vec![TokenSequence::new((2..10).collect(), 0)];
        let (flat, _, len) = batcher.pad(&items);
        assert_eq!(len, 4);
        assert_eq!(flat, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_inputs_and_targets_are_shifted() {
        let device  = Default::default();
        let batcher = LmBatcher::new(16);
        let batch: LmBatch<TestBackend> = batcher.batch(
            vec![TokenSequence::new(vec![2, 3, 4], 0)],
            &device,
        );

        assert_eq!(batch.inputs.dims(), [1, 2]);
        let inputs: Vec<i64>  = batch.inputs.into_data().convert::<i64>().to_vec().unwrap();
        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(inputs, vec![2, 3]);
        assert_eq!(targets, vec![3, 4]);
    }

    #[test]
    fn test_target_count_ignores_padding_and_truncation() {
        let batcher = LmBatcher::new(3);
        let items = vec![
            TokenSequence::new((2..10).collect(), 0),
            TokenSequence::new(vec![5, 6], 0),
            TokenSequence::new(vec![7], 0),
        ];
        assert_eq!(batcher.target_count(&items), 3 + 1);
    }
}
