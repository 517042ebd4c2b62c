// ============================================================
// Layer 5 - Encoder Blocks and Dynamic Layer Routing
// ============================================================
// EncoderBlock is the usual post-norm transformer layer:
//
//   x = LayerNorm(x + Dropout(Attention(x)))
//   x = LayerNorm(x + Dropout(FeedForward(x)))
//
// DynamicLayerAdjustment holds one pre-built EncoderBlock per
// AttentionKind and decides, per forward call, which of them
// processes the input:
//
//   Fixed(kind)  always `kind`
//   Dynamic      by sequence length
//                  seq_len <= global_max_len  → Global
//                  seq_len <= local_max_len   → Local
//                  longer                     → Sparse
//
// A caller-supplied hint overrides both. Blocks that are not
// selected receive no gradient on that step.

use anyhow::{bail, ensure, Result};
use burn::{
    module::Ignored,
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::gelu,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::ml::attention::{AttentionConfig, AttentionKind, SelfAttention};

// ─── FeedForward ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    pub d_model: usize,
    pub d_ff:    usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            up:      LinearConfig::new(self.d_model, self.d_ff).init(device),
            down:    LinearConfig::new(self.d_ff, self.d_model).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    up:      Linear<B>,
    down:    Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.down.forward(self.dropout.forward(gelu(self.up.forward(x))))
    }
}

// ─── EncoderBlock ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct EncoderBlockConfig {
    pub attention: AttentionConfig,
    pub d_ff:      usize,
    #[config(default = 0.1)]
    pub dropout:   f64,
}

impl EncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<EncoderBlock<B>> {
        let d_model = self.attention.d_model;
        Ok(EncoderBlock {
            attention: self.attention.init(device)?,
            ffn:       FeedForwardConfig::new(d_model, self.d_ff)
                .with_dropout(self.dropout)
                .init(device),
            norm1:     LayerNormConfig::new(d_model).init(device),
            norm2:     LayerNormConfig::new(d_model).init(device),
            dropout:   DropoutConfig::new(self.dropout).init(),
        })
    }

    /// Same block with a different attention pattern
    pub fn with_kind(&self, kind: AttentionKind) -> Self {
        let mut cfg = self.clone();
        cfg.attention.kind = kind;
        cfg
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub attention: SelfAttention<B>,
    ffn:           FeedForward<B>,
    norm1:         LayerNorm<B>,
    norm2:         LayerNorm<B>,
    dropout:       Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn_out = self.attention.forward(x.clone());
        let x = self.norm1.forward(x + self.dropout.forward(attn_out));
        let ffn_out = self.ffn.forward(x.clone());
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }

    pub fn kind(&self) -> AttentionKind {
        self.attention.kind()
    }
}

// ─── Routing ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRouting {
    Fixed(AttentionKind),
    Dynamic,
}

impl fmt::Display for LayerRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerRouting::Fixed(kind) => write!(f, "{kind}"),
            LayerRouting::Dynamic     => f.write_str("dynamic"),
        }
    }
}

impl FromStr for LayerRouting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("dynamic") {
            return Ok(LayerRouting::Dynamic);
        }
        match s.parse::<AttentionKind>() {
            Ok(kind) => Ok(LayerRouting::Fixed(kind)),
            Err(_)   => bail!("unknown layer routing '{s}' (expected dynamic or an attention kind)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub routing:        LayerRouting,
    pub global_max_len: usize,
    pub local_max_len:  usize,
}

impl RoutingPolicy {
    pub fn select(&self, seq_len: usize, hint: Option<AttentionKind>) -> AttentionKind {
        if let Some(kind) = hint {
            return kind;
        }
        match self.routing {
            LayerRouting::Fixed(kind) => kind,
            LayerRouting::Dynamic if seq_len <= self.global_max_len => AttentionKind::Global,
            LayerRouting::Dynamic if seq_len <= self.local_max_len  => AttentionKind::Local,
            LayerRouting::Dynamic => AttentionKind::Sparse,
        }
    }
}

// ─── DynamicLayerAdjustment ───────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct DynamicLayerConfig {
    pub block:          EncoderBlockConfig,
    pub routing:        LayerRouting,
    #[config(default = 64)]
    pub global_max_len: usize,
    #[config(default = 256)]
    pub local_max_len:  usize,
}

impl DynamicLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DynamicLayerAdjustment<B>> {
        ensure!(
            self.global_max_len <= self.local_max_len,
            "global_max_len ({}) must not exceed local_max_len ({})",
            self.global_max_len,
            self.local_max_len
        );

        let blocks = AttentionKind::ALL
            .iter()
            .map(|&kind| self.block.with_kind(kind).init(device))
            .collect::<Result<Vec<_>>>()?;

        Ok(DynamicLayerAdjustment {
            blocks,
            policy: Ignored(RoutingPolicy {
                routing:        self.routing,
                global_max_len: self.global_max_len,
                local_max_len:  self.local_max_len,
            }),
        })
    }
}

#[derive(Module, Debug)]
pub struct DynamicLayerAdjustment<B: Backend> {
    /// One block per AttentionKind, in `AttentionKind::ALL` order
    blocks: Vec<EncoderBlock<B>>,
    policy: Ignored<RoutingPolicy>,
}

impl<B: Backend> DynamicLayerAdjustment<B> {
    pub fn select(&self, seq_len: usize, hint: Option<AttentionKind>) -> AttentionKind {
        self.policy.select(seq_len, hint)
    }

    pub fn forward(&self, x: Tensor<B, 3>, hint: Option<AttentionKind>) -> Tensor<B, 3> {
        let [_, seq_len, _] = x.dims();
        let kind = self.select(seq_len, hint);
        self.blocks[kind.index()].forward(x)
    }
}
