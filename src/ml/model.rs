use anyhow::{ensure, Result};
use burn::{
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig,
    },
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::data::batcher::LmBatch;
use crate::domain::vocabulary::{PAD_ID, RESERVED};
use crate::ml::attention::{AttentionConfig, AttentionKind};
use crate::ml::layers::{
    DynamicLayerAdjustment, DynamicLayerConfig, EncoderBlock, EncoderBlockConfig, LayerRouting,
};

/// Anything that maps token ids to next-token logits.
pub trait LanguageModel<B: Backend> {
    /// tokens: [batch, seq_len] → logits: [batch, seq_len, vocab_size]
    fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3>;

    fn vocab_size(&self) -> usize;

    /// Longest input the positional encoding covers
    fn max_seq_len(&self) -> usize;
}

/// Mean next-token cross-entropy over the non-PAD targets.
///
/// The mean is taken over real tokens only, so the loss of a batch
/// does not depend on how much padding collation added.
pub fn next_token_loss<B: Backend, M: LanguageModel<B>>(model: &M, batch: &LmBatch<B>) -> Tensor<B, 1> {
    let logits = model.forward(batch.inputs.clone());
    let [batch_size, seq_len, vocab] = logits.dims();
    let rows = batch_size * seq_len;

    let log_probs = log_softmax(logits.reshape([rows, vocab]), 1);
    let targets   = batch.targets.clone().reshape([rows, 1]);
    let picked    = log_probs.gather(1, targets.clone()).reshape([rows]);

    let real  = targets.reshape([rows]).not_equal_elem(PAD_ID as i32).float();
    let count = real.clone().sum().clamp_min(1.0);

    (picked * real).sum().neg() / count
}

// ─── Shared embedding stack ───────────────────────────────────────────────────
// Token embedding plus fixed sinusoidal positions. Self-attention is
// permutation-invariant, so order has to be injected here.
#[derive(Module, Debug)]
pub struct TokenEmbedder<B: Backend> {
    token:    Embedding<B>,
    position: PositionalEncoding<B>,
    dropout:  Dropout,
}

impl<B: Backend> TokenEmbedder<B> {
    fn new(vocab_size: usize, max_seq_len: usize, d_model: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            token:    EmbeddingConfig::new(vocab_size, d_model).init(device),
            position: PositionalEncodingConfig::new(d_model)
                .with_max_sequence_size(max_seq_len)
                .init(device),
            dropout:  DropoutConfig::new(dropout).init(),
        }
    }

    fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let x = self.token.forward(tokens);
        self.dropout.forward(self.position.forward(x))
    }
}

fn check_common(vocab_size: usize, max_seq_len: usize, d_model: usize) -> Result<()> {
    ensure!(
        d_model % 2 == 0,
        "d_model ({d_model}) must be even for sinusoidal positional encoding"
    );
    ensure!(
        vocab_size > RESERVED,
        "vocab_size ({vocab_size}) leaves no room for corpus words"
    );
    ensure!(max_seq_len > 0, "max_seq_len must be positive");
    Ok(())
}

// ─── DUALM ────────────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct DualmConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub attention:   AttentionKind,
    #[config(default = 16)]
    pub window:      usize,
    #[config(default = 8)]
    pub top_k:       usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl DualmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Dualm<B>> {
        check_common(self.vocab_size, self.max_seq_len, self.d_model)?;
        ensure!(self.num_layers > 0, "DUALM needs at least one layer");

        let block = EncoderBlockConfig::new(
            AttentionConfig::new(self.d_model, self.num_heads, self.attention)
                .with_window(self.window)
                .with_top_k(self.top_k)
                .with_dropout(self.dropout),
            self.d_ff,
        )
        .with_dropout(self.dropout);

        let layers = (0..self.num_layers)
            .map(|_| block.init(device))
            .collect::<Result<Vec<_>>>()?;

        Ok(Dualm {
            embedder:    TokenEmbedder::new(self.vocab_size, self.max_seq_len, self.d_model, self.dropout, device),
            layers,
            final_norm:  LayerNormConfig::new(self.d_model).init(device),
            head:        LinearConfig::new(self.d_model, self.vocab_size).init(device),
            vocab_size:  self.vocab_size,
            max_seq_len: self.max_seq_len,
        })
    }
}

#[derive(Module, Debug)]
pub struct Dualm<B: Backend> {
    embedder:        TokenEmbedder<B>,
    pub layers:      Vec<EncoderBlock<B>>,
    final_norm:      LayerNorm<B>,
    pub head:        Linear<B>,
    vocab_size:      usize,
    max_seq_len:     usize,
}

impl<B: Backend> LanguageModel<B> for Dualm<B> {
    fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let mut x = self.embedder.forward(tokens);
        for layer in &self.layers {
            x = layer.forward(x);
        }
        self.head.forward(self.final_norm.forward(x))
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }
}

// ─── Hierarchical DUALM ───────────────────────────────────────────────────────
// One DynamicLayerAdjustment per level. A typical hierarchy is
// local → dynamic → global: lower levels build phrase-level
// features cheaply, upper levels see the whole sentence.
#[derive(Config, Debug)]
pub struct HierarchicalDualmConfig {
    pub vocab_size:     usize,
    pub max_seq_len:    usize,
    pub d_model:        usize,
    pub num_heads:      usize,
    pub d_ff:           usize,
    pub levels:         Vec<LayerRouting>,
    #[config(default = 16)]
    pub window:         usize,
    #[config(default = 8)]
    pub top_k:          usize,
    #[config(default = 0.1)]
    pub dropout:        f64,
    #[config(default = 64)]
    pub global_max_len: usize,
    #[config(default = 256)]
    pub local_max_len:  usize,
}

impl HierarchicalDualmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<HierarchicalDualm<B>> {
        check_common(self.vocab_size, self.max_seq_len, self.d_model)?;
        ensure!(!self.levels.is_empty(), "hierarchical DUALM needs at least one level");

        let block = EncoderBlockConfig::new(
            AttentionConfig::new(self.d_model, self.num_heads, AttentionKind::Global)
                .with_window(self.window)
                .with_top_k(self.top_k)
                .with_dropout(self.dropout),
            self.d_ff,
        )
        .with_dropout(self.dropout);

        let levels = self
            .levels
            .iter()
            .map(|&routing| {
                DynamicLayerConfig::new(block.clone(), routing)
                    .with_global_max_len(self.global_max_len)
                    .with_local_max_len(self.local_max_len)
                    .init(device)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(HierarchicalDualm {
            embedder:    TokenEmbedder::new(self.vocab_size, self.max_seq_len, self.d_model, self.dropout, device),
            levels,
            final_norm:  LayerNormConfig::new(self.d_model).init(device),
            head:        LinearConfig::new(self.d_model, self.vocab_size).init(device),
            vocab_size:  self.vocab_size,
            max_seq_len: self.max_seq_len,
        })
    }
}

#[derive(Module, Debug)]
pub struct HierarchicalDualm<B: Backend> {
    embedder:    TokenEmbedder<B>,
    levels:      Vec<DynamicLayerAdjustment<B>>,
    final_norm:  LayerNorm<B>,
    pub head:    Linear<B>,
    vocab_size:  usize,
    max_seq_len: usize,
}

impl<B: Backend> HierarchicalDualm<B> {
    /// Forward pass where `hint` (when given) overrides every level's routing
    pub fn forward_with_hint(
        &self,
        tokens: Tensor<B, 2, Int>,
        hint:   Option<AttentionKind>,
    ) -> Tensor<B, 3> {
        let mut x = self.embedder.forward(tokens);
        for level in &self.levels {
            x = level.forward(x, hint);
        }
        self.head.forward(self.final_norm.forward(x))
    }

    /// The attention kind each level would use for a sequence of `seq_len`
    pub fn routes(&self, seq_len: usize, hint: Option<AttentionKind>) -> Vec<AttentionKind> {
        self.levels.iter().map(|l| l.select(seq_len, hint)).collect()
    }
}

impl<B: Backend> LanguageModel<B> for HierarchicalDualm<B> {
    fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.forward_with_hint(tokens, None)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }
}
