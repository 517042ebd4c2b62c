// ============================================================
// Layer 5 - Greedy Generator
// ============================================================
// Extends a prompt one token at a time:
//
//   context = last max_seq_len tokens of (prompt + generated)
//   logits  = model(context)[.., last position, ..]
//   next    = argmax(logits)
//
// Generation stops after max_new_tokens or when the model picks
// PAD_ID, which it has learned as end-of-sequence padding.

use anyhow::{ensure, Result};
use burn::prelude::*;

use crate::domain::vocabulary::PAD_ID;
use crate::ml::model::LanguageModel;

/// Returns only the newly generated ids.
pub fn generate<B: Backend, M: LanguageModel<B>>(
    model:          &M,
    prompt:         &[u32],
    max_new_tokens: usize,
    device:         &B::Device,
) -> Result<Vec<u32>> {
    ensure!(!prompt.is_empty(), "Prompt must contain at least one token");

    let window    = model.max_seq_len();
    let mut ids   = prompt.to_vec();
    let mut fresh = Vec::with_capacity(max_new_tokens);

    for _ in 0..max_new_tokens {
        let start   = ids.len().saturating_sub(window);
        let context: Vec<i32> = ids[start..].iter().map(|&id| id as i32).collect();
        let len     = context.len();

        let tokens = Tensor::<B, 1, Int>::from_ints(context.as_slice(), device).reshape([1, len]);
        let logits = model.forward(tokens);
        let vocab  = logits.dims()[2];

        let last = logits.slice([0..1, len - 1..len, 0..vocab]).reshape([vocab]);
        let next = last.argmax(0).into_scalar().elem::<i64>() as u32;

        if next == PAD_ID {
            tracing::debug!("Model emitted padding after {} tokens, stopping", fresh.len());
            break;
        }

        ids.push(next);
        fresh.push(next);
    }

    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::attention::AttentionKind;
    use crate::ml::model::{Dualm, DualmConfig};
    use burn::{backend::NdArray, module::Param, tensor::TensorData};

    type TestBackend = NdArray;

    fn model(device: &<TestBackend as Backend>::Device) -> Dualm<TestBackend> {
        DualmConfig::new(10, 4, 8, 2, 1, 16, AttentionKind::Global)
            .with_dropout(0.0)
            .init(device)
            .unwrap()
    }

    #[test]
    fn test_rejects_empty_prompt() {
        let device = Default::default();
        assert!(generate(&model(&device), &[], 3, &device).is_err());
    }

    #[test]
    fn test_generates_at_most_requested_tokens_in_vocab() {
        let device = Default::default();
        let m      = model(&device);
        let out    = generate(&m, &[2, 3, 4], 6, &device).unwrap();

        assert!(out.len() <= 6);
        assert!(out.iter().all(|&id| id < 10 && id != PAD_ID));
    }

    #[test]
    fn test_prompt_longer_than_window_is_truncated() {
        let device = Default::default();
        let m      = model(&device);
        let prompt: Vec<u32> = (2..10).collect();
        assert!(generate(&m, &prompt, 2, &device).is_ok());
    }

    #[test]
    fn test_greedy_is_deterministic() {
        let device = Default::default();
        let m      = model(&device);
        let a = generate(&m, &[5, 6], 4, &device).unwrap();
        let b = generate(&m, &[5, 6], 4, &device).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stops_when_padding_wins() {
        let device = Default::default();
        let mut m  = model(&device);

        let mut bias = vec![0.0f32; 10];
        bias[PAD_ID as usize] = 1e4;
        m.head.bias = Some(Param::from_tensor(Tensor::from_data(
            TensorData::new(bias, [10]),
            &device,
        )));

        let out = generate(&m, &[2, 3], 5, &device).unwrap();
        assert!(out.is_empty());
    }
}
