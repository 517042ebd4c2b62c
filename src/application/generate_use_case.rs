// ============================================================
// Layer 2 - GenerateUseCase
// ============================================================
// Loads everything a finished run left in the checkpoint
// directory and continues a prompt:
//
//   1. tokenizer.json   → encode / decode
//   2. model_spec.json  → rebuild the right architecture
//   3. model_epoch_N    → load the latest weights
//
// The prompt goes through the same sentence normalisation as the
// training corpus, so "It Is" and "it is" encode identically.

use anyhow::{ensure, Result};
use burn::backend::wgpu::WgpuDevice;
use tokenizers::Tokenizer;

use crate::application::{model_spec::ModelSpec, AppBackend};
use crate::data::preprocessor::Preprocessor;
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::{decode, encode, TokenizerStore},
};
use crate::ml::{
    generator::generate,
    model::{Dualm, HierarchicalDualm},
};

enum LoadedModel {
    Dualm(Dualm<AppBackend>),
    Hierarchical(HierarchicalDualm<AppBackend>),
}

pub struct GenerateUseCase {
    tokenizer: Tokenizer,
    model:     LoadedModel,
    device:    WgpuDevice,
}

impl GenerateUseCase {
    pub fn new(checkpoint_dir: &str) -> Result<Self> {
        let tokenizer = TokenizerStore::new(checkpoint_dir).load_tokenizer()?;
        let ckpt      = CheckpointManager::new(checkpoint_dir)?;
        let spec      = ckpt.load_spec()?;
        let device    = WgpuDevice::default();

        tracing::info!("Rebuilding {} model from '{}'", spec.architecture(), checkpoint_dir);

        let model = match &spec {
            ModelSpec::Dualm(cfg) => {
                LoadedModel::Dualm(ckpt.load_model(cfg.init(&device)?, &device)?)
            }
            ModelSpec::Hierarchical(cfg) => {
                LoadedModel::Hierarchical(ckpt.load_model(cfg.init(&device)?, &device)?)
            }
        };

        Ok(Self { tokenizer, model, device })
    }

    /// Continue `prompt` by up to `max_new_tokens` words.
    pub fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        let normalised = Preprocessor::new().normalise_sentence(prompt);
        ensure!(!normalised.is_empty(), "Prompt has no words after normalisation");

        let ids = encode(&self.tokenizer, &normalised)?;
        tracing::debug!("Prompt ids: {:?}", ids);

        let fresh = match &self.model {
            LoadedModel::Dualm(m)        => generate::<AppBackend, _>(m, &ids, max_new_tokens, &self.device)?,
            LoadedModel::Hierarchical(m) => generate::<AppBackend, _>(m, &ids, max_new_tokens, &self.device)?,
        };

        decode(&self.tokenizer, &fresh)
    }
}
