// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates supervised training in order:
//
//   Step 1: Prepare the corpus           (see corpus.rs)
//   Step 2: Derive the model spec        (vocab size from step 1)
//   Step 3: Split train/validation/test  (Layer 4 - data)
//   Step 4: Save model spec              (Layer 6 - infra)
//   Step 5: Build the model              (Layer 5 - ml)
//   Step 6: Run training loop            (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::backend::wgpu::WgpuDevice;
use serde::{Deserialize, Serialize};

use crate::application::{
    corpus::{prepare_corpus, CorpusConfig},
    model_spec::{ModelOptions, ModelSpec},
    AppAutodiffBackend,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    model::{Dualm, HierarchicalDualm},
    trainer::{train, TrainingReport, TrainingSettings},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Serialisable so a run can be described in, or reproduced from, JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub corpus:      CorpusConfig,
    pub model:       ModelOptions,
    pub epochs:      usize,
    pub batch_size:  usize,
    pub lr:          f64,
    pub num_workers: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpus:      CorpusConfig::default(),
            model:       ModelOptions::default(),
            epochs:      10,
            batch_size:  32,
            lr:          3e-4,
            num_workers: 2,
        }
    }
}

impl TrainConfig {
    pub fn settings(&self) -> TrainingSettings {
        TrainingSettings {
            epochs:      self.epochs,
            batch_size:  self.batch_size,
            lr:          self.lr,
            max_seq_len: self.corpus.max_seq_len,
            seed:        self.corpus.seed,
            num_workers: self.num_workers,
        }
    }
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingReport> {
        let cfg = &self.config;

        // ── Steps 1-3: Corpus, spec, split ────────────────────────────────────
        let corpus = prepare_corpus(&cfg.corpus)?;
        let spec   = cfg.model.spec(corpus.vocab.len(), cfg.corpus.max_seq_len);
        let split  = corpus.split(&cfg.corpus)?;

        // ── Step 4: Save spec for generation ──────────────────────────────────
        let ckpt    = CheckpointManager::new(&cfg.corpus.checkpoint_dir)?;
        let metrics = MetricsLogger::new::<EpochMetrics>(&cfg.corpus.checkpoint_dir, "metrics.csv")?;
        ckpt.save_spec(&spec)?;

        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        tracing::info!("Model: {} (vocab {})", spec.architecture(), spec.vocab_size());

        // ── Steps 5-6: Build and train ────────────────────────────────────────
        let settings = cfg.settings();
        let report = match &spec {
            ModelSpec::Dualm(model_cfg) => {
                let model: Dualm<AppAutodiffBackend> = model_cfg.init(&device)?;
                train::<AppAutodiffBackend, _>(model, &settings, split, &ckpt, &metrics, &device)?.1
            }
            ModelSpec::Hierarchical(model_cfg) => {
                let model: HierarchicalDualm<AppAutodiffBackend> = model_cfg.init(&device)?;
                train::<AppAutodiffBackend, _>(model, &settings, split, &ckpt, &metrics, &device)?.1
            }
        };

        Ok(report)
    }
}
