// ============================================================
// Layer 2 - Model Spec
// ============================================================
// Which architecture was trained and with which hyperparameters.
// Saved as model_spec.json next to the weights; `generate` and
// `meta-train --resume` rebuild the exact module tree from it
// before loading the checkpoint.
//
//   { "architecture": "dualm",        "config": { DualmConfig } }
//   { "architecture": "hierarchical", "config": { HierarchicalDualmConfig } }

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::ml::attention::AttentionKind;
use crate::ml::layers::LayerRouting;
use crate::ml::model::{DualmConfig, HierarchicalDualmConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Dualm,
    Hierarchical,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Dualm        => f.write_str("dualm"),
            Architecture::Hierarchical => f.write_str("hierarchical"),
        }
    }
}

impl FromStr for Architecture {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dualm"        => Ok(Architecture::Dualm),
            "hierarchical" => Ok(Architecture::Hierarchical),
            other          => bail!("unknown architecture '{other}' (expected dualm or hierarchical)"),
        }
    }
}

/// Architecture-independent hyperparameters as given on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOptions {
    pub architecture:   Architecture,
    /// Attention of every DUALM layer
    pub attention:      AttentionKind,
    /// One routing per hierarchical level
    pub levels:         Vec<LayerRouting>,
    pub d_model:        usize,
    pub num_heads:      usize,
    pub num_layers:     usize,
    pub d_ff:           usize,
    pub window:         usize,
    pub top_k:          usize,
    pub dropout:        f64,
    pub global_max_len: usize,
    pub local_max_len:  usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            architecture:   Architecture::Dualm,
            attention:      AttentionKind::Global,
            levels:         vec![
                LayerRouting::Fixed(AttentionKind::Local),
                LayerRouting::Dynamic,
                LayerRouting::Fixed(AttentionKind::Global),
            ],
            d_model:        128,
            num_heads:      4,
            num_layers:     4,
            d_ff:           512,
            window:         16,
            top_k:          8,
            dropout:        0.1,
            global_max_len: 32,
            local_max_len:  48,
        }
    }
}

impl ModelOptions {
    /// Vocabulary size and context length come from the prepared corpus.
    pub fn spec(&self, vocab_size: usize, max_seq_len: usize) -> ModelSpec {
        match self.architecture {
            Architecture::Dualm => ModelSpec::Dualm(
                DualmConfig::new(
                    vocab_size, max_seq_len, self.d_model,
                    self.num_heads, self.num_layers, self.d_ff, self.attention,
                )
                .with_window(self.window)
                .with_top_k(self.top_k)
                .with_dropout(self.dropout),
            ),
            Architecture::Hierarchical => ModelSpec::Hierarchical(
                HierarchicalDualmConfig::new(
                    vocab_size, max_seq_len, self.d_model,
                    self.num_heads, self.d_ff, self.levels.clone(),
                )
                .with_window(self.window)
                .with_top_k(self.top_k)
                .with_dropout(self.dropout)
                .with_global_max_len(self.global_max_len)
                .with_local_max_len(self.local_max_len),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "architecture", content = "config", rename_all = "lowercase")]
pub enum ModelSpec {
    Dualm(DualmConfig),
    Hierarchical(HierarchicalDualmConfig),
}

impl ModelSpec {
    pub fn architecture(&self) -> Architecture {
        match self {
            ModelSpec::Dualm(_)        => Architecture::Dualm,
            ModelSpec::Hierarchical(_) => Architecture::Hierarchical,
        }
    }

    pub fn vocab_size(&self) -> usize {
        match self {
            ModelSpec::Dualm(c)        => c.vocab_size,
            ModelSpec::Hierarchical(c) => c.vocab_size,
        }
    }

    pub fn max_seq_len(&self) -> usize {
        match self {
            ModelSpec::Dualm(c)        => c.max_seq_len,
            ModelSpec::Hierarchical(c) => c.max_seq_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_architecture() {
        assert_eq!("DUALM".parse::<Architecture>().unwrap(), Architecture::Dualm);
        assert_eq!(" hierarchical".parse::<Architecture>().unwrap(), Architecture::Hierarchical);
        assert!("lstm".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_options_select_architecture() {
        let mut opts = ModelOptions::default();
        let spec = opts.spec(500, 32);
        assert_eq!(spec.architecture(), Architecture::Dualm);
        assert_eq!((spec.vocab_size(), spec.max_seq_len()), (500, 32));

        opts.architecture = Architecture::Hierarchical;
        match opts.spec(500, 32) {
            ModelSpec::Hierarchical(c) => assert_eq!(c.levels.len(), 3),
            other => panic!("expected hierarchical spec, got {other:?}"),
        }
    }

    #[test]
    fn test_spec_json_round_trip_keeps_architecture() {
        let mut opts = ModelOptions::default();
        opts.architecture = Architecture::Hierarchical;
        let json = serde_json::to_string(&opts.spec(100, 16)).unwrap();
        assert!(json.contains("\"architecture\":\"hierarchical\""));

        let back: ModelSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.architecture(), Architecture::Hierarchical);
        assert_eq!(back.vocab_size(), 100);
    }
}
