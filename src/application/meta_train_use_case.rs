// ============================================================
// Layer 2 - MetaTrainUseCase
// ============================================================
// Orchestrates meta-learning in order:
//
//   Step 1: Prepare the corpus               (see corpus.rs)
//   Step 2: Group training split into tasks  (Layer 4 - data)
//   Step 3: Support/query split per task     (Layer 5 - ml)
//   Step 4: Build model, or resume weights   (Layer 6 - infra)
//   Step 5: Run the MAML outer loop          (Layer 5 - ml)
//
// With `resume`, the architecture comes from model_spec.json and
// the latest checkpoint is the meta-learner's starting point, so
// a supervised run can be followed by meta-training.

use anyhow::{ensure, Result};
use burn::backend::wgpu::WgpuDevice;
use serde::{Deserialize, Serialize};

use crate::application::{
    corpus::{prepare_corpus, CorpusConfig},
    model_spec::{ModelOptions, ModelSpec},
    AppAutodiffBackend,
};
use crate::data::dataset::SequenceDataset;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{MetaMetrics, MetricsLogger},
};
use crate::ml::{
    meta::{build_tasks, run, MetaSettings},
    model::{Dualm, HierarchicalDualm},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaTrainConfig {
    pub corpus:           CorpusConfig,
    pub model:            ModelOptions,
    pub batch_size:       usize,
    pub inner_steps:      usize,
    pub inner_lr:         f64,
    pub meta_lr:          f64,
    pub meta_batch_size:  usize,
    pub meta_iterations:  usize,
    pub support_fraction: f64,
    pub resume:           bool,
}

impl Default for MetaTrainConfig {
    fn default() -> Self {
        Self {
            corpus:           CorpusConfig::default(),
            model:            ModelOptions::default(),
            batch_size:       16,
            inner_steps:      5,
            inner_lr:         1e-2,
            meta_lr:          1e-3,
            meta_batch_size:  4,
            meta_iterations:  100,
            support_fraction: 0.5,
            resume:           false,
        }
    }
}

impl MetaTrainConfig {
    pub fn settings(&self) -> MetaSettings {
        MetaSettings {
            inner_steps:     self.inner_steps,
            inner_lr:        self.inner_lr,
            meta_lr:         self.meta_lr,
            meta_batch_size: self.meta_batch_size,
            meta_iterations: self.meta_iterations,
            batch_size:      self.batch_size,
            max_seq_len:     self.corpus.max_seq_len,
            seed:            self.corpus.seed,
        }
    }
}

pub struct MetaTrainUseCase {
    config: MetaTrainConfig,
}

impl MetaTrainUseCase {
    pub fn new(config: MetaTrainConfig) -> Self {
        Self { config }
    }

    /// Returns one metrics row per meta-iteration
    pub fn execute(&self) -> Result<Vec<MetaMetrics>> {
        let cfg = &self.config;

        // ── Steps 1-3: Corpus → tasks ─────────────────────────────────────────
        let corpus     = prepare_corpus(&cfg.corpus)?;
        let vocab_size = corpus.vocab.len();
        let split      = corpus.split(&cfg.corpus)?;
        let groups     = SequenceDataset::new(split.train).tasks();
        let tasks      = build_tasks(groups, cfg.support_fraction)?;
        tracing::info!("Built {} meta-learning tasks", tasks.len());

        // ── Step 4: Model spec, fresh or resumed ──────────────────────────────
        let ckpt    = CheckpointManager::new(&cfg.corpus.checkpoint_dir)?;
        let metrics = MetricsLogger::new::<MetaMetrics>(&cfg.corpus.checkpoint_dir, "meta_metrics.csv")?;

        let spec = if cfg.resume {
            let spec = ckpt.load_spec()?;
            ensure!(
                spec.vocab_size() == vocab_size && spec.max_seq_len() == cfg.corpus.max_seq_len,
                "Saved model (vocab {}, max_seq_len {}) does not match the corpus (vocab {}, max_seq_len {})",
                spec.vocab_size(),
                spec.max_seq_len(),
                vocab_size,
                cfg.corpus.max_seq_len
            );
            spec
        } else {
            let spec = cfg.model.spec(vocab_size, cfg.corpus.max_seq_len);
            ckpt.save_spec(&spec)?;
            spec
        };

        let device   = WgpuDevice::default();
        let settings = cfg.settings();
        tracing::info!("Using WGPU device: {:?}", device);

        // ── Step 5: Outer loop ────────────────────────────────────────────────
        let rows = match &spec {
            ModelSpec::Dualm(model_cfg) => {
                let mut model: Dualm<AppAutodiffBackend> = model_cfg.init(&device)?;
                if cfg.resume {
                    model = ckpt.load_model(model, &device)?;
                }
                run::<AppAutodiffBackend, _>(model, &tasks, &settings, &ckpt, &metrics, &device)?.1
            }
            ModelSpec::Hierarchical(model_cfg) => {
                let mut model: HierarchicalDualm<AppAutodiffBackend> = model_cfg.init(&device)?;
                if cfg.resume {
                    model = ckpt.load_model(model, &device)?;
                }
                run::<AppAutodiffBackend, _>(model, &tasks, &settings, &ckpt, &metrics, &device)?.1
            }
        };

        Ok(rows)
    }
}
