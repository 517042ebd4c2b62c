// ============================================================
// Layer 5 - Attention Variants
// ============================================================
// One multi-head scaled dot-product attention module whose
// masking pattern is chosen at construction time:
//
//   Global   every query sees every (earlier) key
//   Local    a query sees keys closer than `window` positions
//   Sparse   a query keeps only its `top_k` highest scores
//   Diverse  head i uses pattern i % 3 of (global, local, sparse)
//
// All patterns share the same projections and the same math:
//
//   scores  = Q Kᵀ / √d_head              [batch, heads, seq, seq]
//   scores  = mask(scores)                pattern-specific
//   weights = softmax(scores, dim = keys)
//   context = weights V                   → output projection
//
// Masked positions are filled with a large negative value rather
// than -inf so a fully masked row can never produce NaN.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Child et al. (2019) Sparse Transformers (top-k / local)

use anyhow::{bail, ensure, Result};
use burn::{
    module::Ignored,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{activation::softmax, Bool, TensorData},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const MASK_VALUE: f32 = -1.0e9;

/// Patterns a Diverse attention cycles through, one per head
const DIVERSE_CYCLE: [AttentionKind; 3] = [
    AttentionKind::Global,
    AttentionKind::Local,
    AttentionKind::Sparse,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionKind {
    Global,
    Local,
    Sparse,
    Diverse,
}

impl AttentionKind {
    pub const ALL: [AttentionKind; 4] = [
        AttentionKind::Global,
        AttentionKind::Local,
        AttentionKind::Sparse,
        AttentionKind::Diverse,
    ];

    /// Position of this kind in `ALL`
    pub fn index(self) -> usize {
        match self {
            AttentionKind::Global  => 0,
            AttentionKind::Local   => 1,
            AttentionKind::Sparse  => 2,
            AttentionKind::Diverse => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttentionKind::Global  => "global",
            AttentionKind::Local   => "local",
            AttentionKind::Sparse  => "sparse",
            AttentionKind::Diverse => "diverse",
        }
    }
}

impl fmt::Display for AttentionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttentionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global"  => Ok(AttentionKind::Global),
            "local"   => Ok(AttentionKind::Local),
            "sparse"  => Ok(AttentionKind::Sparse),
            "diverse" => Ok(AttentionKind::Diverse),
            other     => bail!("unknown attention kind '{other}' (expected global, local, sparse or diverse)"),
        }
    }
}

#[derive(Config, Debug)]
pub struct AttentionConfig {
    pub d_model:   usize,
    pub num_heads: usize,
    pub kind:      AttentionKind,
    /// Local attention span, the query itself included
    #[config(default = 16)]
    pub window:    usize,
    /// Scores kept per query by sparse attention
    #[config(default = 8)]
    pub top_k:     usize,
    #[config(default = true)]
    pub causal:    bool,
    #[config(default = 0.1)]
    pub dropout:   f64,
}

impl AttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SelfAttention<B>> {
        ensure!(self.num_heads > 0, "num_heads must be positive");
        ensure!(
            self.d_model % self.num_heads == 0,
            "d_model ({}) must be divisible by num_heads ({})",
            self.d_model,
            self.num_heads
        );
        ensure!(self.window > 0, "local attention window must be positive");
        ensure!(self.top_k > 0, "sparse attention top_k must be positive");

        let projection = || LinearConfig::new(self.d_model, self.d_model).init(device);

        Ok(SelfAttention {
            query:     projection(),
            key:       projection(),
            value:     projection(),
            output:    projection(),
            dropout:   DropoutConfig::new(self.dropout).init(),
            num_heads: self.num_heads,
            head_dim:  self.d_model / self.num_heads,
            pattern:   Ignored(MaskPattern {
                kind:   self.kind,
                window: self.window,
                top_k:  self.top_k,
                causal: self.causal,
            }),
        })
    }
}

/// Non-learned part of an attention layer
#[derive(Debug, Clone)]
pub struct MaskPattern {
    pub kind:   AttentionKind,
    pub window: usize,
    pub top_k:  usize,
    pub causal: bool,
}

#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    query:     Linear<B>,
    key:       Linear<B>,
    value:     Linear<B>,
    output:    Linear<B>,
    dropout:   Dropout,
    num_heads: usize,
    head_dim:  usize,
    pattern:   Ignored<MaskPattern>,
}

impl<B: Backend> SelfAttention<B> {
    pub fn kind(&self) -> AttentionKind {
        self.pattern.kind
    }

    /// x: [batch, seq_len, d_model] → [batch, seq_len, d_model]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq_len, d_model] = x.dims();
        let (weights, value) = self.weights_and_values(x);

        let context = self
            .dropout
            .forward(weights)
            .matmul(value)
            .swap_dims(1, 2)
            .reshape([batch, seq_len, d_model]);

        self.output.forward(context)
    }

    /// Post-softmax attention weights, [batch, heads, seq_len, seq_len]
    pub fn attention_weights(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        self.weights_and_values(x).0
    }

    fn weights_and_values(&self, x: Tensor<B, 3>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let [batch, seq_len, _] = x.dims();
        let split_heads = |t: Tensor<B, 3>| {
            t.reshape([batch, seq_len, self.num_heads, self.head_dim])
                .swap_dims(1, 2)
        };

        let q = split_heads(self.query.forward(x.clone()));
        let k = split_heads(self.key.forward(x.clone()));
        let v = split_heads(self.value.forward(x));

        let scores = q
            .matmul(k.transpose())
            .div_scalar((self.head_dim as f64).sqrt());
        let scores = self.mask_scores(scores);

        (softmax(scores, 3), v)
    }

    fn mask_scores(&self, scores: Tensor<B, 4>) -> Tensor<B, 4> {
        match self.pattern.kind {
            AttentionKind::Diverse => {
                let [_, heads, _, _] = scores.dims();
                let per_head: Vec<Tensor<B, 4>> = (0..heads)
                    .map(|h| {
                        let head = scores.clone().narrow(1, h, 1);
                        self.apply_pattern(DIVERSE_CYCLE[h % DIVERSE_CYCLE.len()], head)
                    })
                    .collect();
                Tensor::cat(per_head, 1)
            }
            kind => self.apply_pattern(kind, scores),
        }
    }

    fn apply_pattern(&self, kind: AttentionKind, scores: Tensor<B, 4>) -> Tensor<B, 4> {
        let scores = self.apply_static_mask(kind, scores);
        if kind == AttentionKind::Sparse {
            keep_top_k(scores, self.pattern.top_k)
        } else {
            scores
        }
    }

    fn apply_static_mask(&self, kind: AttentionKind, scores: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, heads, seq_len, _] = scores.dims();
        let blocked = blocked_positions(kind, seq_len, self.pattern.window, self.pattern.causal);
        if !blocked.iter().any(|&b| b) {
            return scores;
        }

        let mask = Tensor::<B, 2, Bool>::from_bool(
            TensorData::new(blocked, [seq_len, seq_len]),
            &scores.device(),
        )
        .unsqueeze::<4>()
        .expand([batch, heads, seq_len, seq_len]);

        scores.mask_fill(mask, MASK_VALUE)
    }
}

/// Row-major [query, key] grid, `true` where the query must not see the key.
///
/// Only Global and Local have a static shape; Sparse starts from the
/// Global grid and prunes by score later.
pub fn blocked_positions(
    kind:    AttentionKind,
    seq_len: usize,
    window:  usize,
    causal:  bool,
) -> Vec<bool> {
    let mut blocked = Vec::with_capacity(seq_len * seq_len);
    for q in 0..seq_len {
        for k in 0..seq_len {
            let future  = causal && k > q;
            let outside = kind == AttentionKind::Local && q.abs_diff(k) >= window;
            blocked.push(future || outside);
        }
    }
    blocked
}

/// Mask every score below the k-th largest of its row.
fn keep_top_k<B: Backend>(scores: Tensor<B, 4>, top_k: usize) -> Tensor<B, 4> {
    let [batch, heads, seq_len, keys] = scores.dims();
    let k = top_k.min(keys);
    if k == keys {
        return scores;
    }

    let threshold = scores
        .clone()
        .detach()
        .topk(k, 3)
        .narrow(3, k - 1, 1)
        .expand([batch, heads, seq_len, keys]);
    let dropped = scores.clone().lower(threshold);

    scores.mask_fill(dropped, MASK_VALUE)
}
