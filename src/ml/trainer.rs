// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Supervised next-token training using Burn's DataLoader and Adam.
//
// The loop is generic over the model, so DUALM and the
// hierarchical variant share it:
//   - training runs on an AutodiffBackend B
//   - model.valid() returns the model on B::InnerBackend with
//     dropout disabled, used for validation and test loss
//   - evaluation batches are collated directly on the inner
//     backend, no second DataLoader needed
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{batcher::LmBatcher, dataset::SequenceDataset};
use crate::domain::sample::{CorpusSplit, TokenSequence};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{next_token_loss, LanguageModel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub epochs:      usize,
    pub batch_size:  usize,
    pub lr:          f64,
    pub max_seq_len: usize,
    pub seed:        u64,
    pub num_workers: usize,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs:    Vec<EpochMetrics>,
    /// None when the test split is empty
    pub test_loss: Option<f64>,
}

impl TrainingReport {
    pub fn best_val_loss(&self) -> Option<f64> {
        self.epochs
            .iter()
            .map(|m| m.val_loss)
            .filter(|l| !l.is_nan())
            .fold(None, |best, l| Some(best.map_or(l, |b: f64| b.min(l))))
    }
}

pub fn train<B, M>(
    model:    M,
    settings: &TrainingSettings,
    split:    CorpusSplit<TokenSequence>,
    ckpt:     &CheckpointManager,
    metrics:  &MetricsLogger,
    device:   &B::Device,
) -> Result<(M, TrainingReport)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + LanguageModel<B>,
    M::InnerModule: LanguageModel<B::InnerBackend>,
{
    ensure!(!split.train.is_empty(), "Training split is empty, nothing to train on");
    ensure!(settings.batch_size > 0, "batch_size must be positive");

    tracing::info!(
        "Training on {} sequences ({} validation, {} test)",
        split.train.len(),
        split.validation.len(),
        split.test.len()
    );

    let mut model = model;

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    let train_loader = DataLoaderBuilder::new(LmBatcher::new(settings.max_seq_len))
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers.max(1))
        .set_device(device.clone())
        .build(SequenceDataset::new(split.train));

    let mut history = Vec::with_capacity(settings.epochs);

    for epoch in 1..=settings.epochs {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in train_loader.iter() {
            let loss = next_token_loss(&model, &batch);
            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(settings.lr, model, grads);
        }

        let train_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };

        let val_loss = evaluate::<B::InnerBackend, _>(
            &model.valid(),
            &split.validation,
            settings.batch_size,
            settings.max_seq_len,
            device,
        )
        .unwrap_or(f64::NAN);

        let row = EpochMetrics::new(epoch, train_loss, val_loss);
        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_ppl={:.2}",
            epoch, settings.epochs, train_loss, val_loss, row.val_perplexity(),
        );

        metrics.log(&row)?;
        ckpt.save_model(&model, epoch)?;
        history.push(row);
    }

    let test_loss = evaluate::<B::InnerBackend, _>(
        &model.valid(),
        &split.test,
        settings.batch_size,
        settings.max_seq_len,
        device,
    );
    match test_loss {
        Some(loss) => tracing::info!(
            "Test loss {:.4}, perplexity {:.2}",
            loss,
            loss.exp()
        ),
        None => tracing::warn!("Test split is empty, no test loss reported"),
    }

    tracing::info!("Training complete!");
    Ok((model, TrainingReport { epochs: history, test_loss }))
}

/// Mean next-token loss per non-PAD target over `samples`.
/// Returns None when there is nothing to score.
pub fn evaluate<B: Backend, M: LanguageModel<B>>(
    model:       &M,
    samples:     &[TokenSequence],
    batch_size:  usize,
    max_seq_len: usize,
    device:      &B::Device,
) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let batcher = LmBatcher::new(max_seq_len);
    let mut total  = 0.0f64;
    let mut weight = 0usize;

    for chunk in samples.chunks(batch_size.max(1)) {
        let targets = batcher.target_count(chunk);
        if targets == 0 {
            continue;
        }
        let batch = batcher.collate::<B>(chunk, device);
        let loss: f64 = next_token_loss(model, &batch).into_scalar().elem();
        total  += loss * targets as f64;
        weight += targets;
    }

    (weight > 0).then(|| total / weight as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::attention::AttentionKind;
    use crate::ml::model::{Dualm, DualmConfig};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> Dualm<TestBackend> {
        DualmConfig::new(12, 8, 16, 2, 1, 32, AttentionKind::Global)
            .with_dropout(0.0)
            .init(device)
            .unwrap()
    }

    fn repeated(n: usize) -> Vec<TokenSequence> {
        (0..n)
            .map(|i| TokenSequence::new(vec![2, 3, 4, 5, 6, 7, 8, 9], i % 2))
            .collect()
    }

    fn settings(epochs: usize) -> TrainingSettings {
        TrainingSettings {
            epochs,
            batch_size: 4,
            lr: 1e-2,
            max_seq_len: 8,
            seed: 7,
            num_workers: 1,
        }
    }

    #[test]
    fn test_rejects_empty_training_split() {
        let device  = Default::default();
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new::<EpochMetrics>(dir.path(), "metrics.csv").unwrap();
        let split   = CorpusSplit { train: vec![], validation: repeated(2), test: vec![] };

        let result = train(tiny_model(&device), &settings(1), split, &ckpt, &metrics, &device);
        assert!(result.is_err());
    }

    #[test]
    fn test_loss_decreases_and_checkpoints_written() {
        let device  = Default::default();
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new::<EpochMetrics>(dir.path(), "metrics.csv").unwrap();
        let split   = CorpusSplit { train: repeated(8), validation: repeated(2), test: vec![] };

        let (_, report) =
            train(tiny_model(&device), &settings(5), split, &ckpt, &metrics, &device).unwrap();

        assert_eq!(report.epochs.len(), 5);
        let first = report.epochs[0].train_loss;
        let last  = report.epochs[4].train_loss;
        assert!(last < first, "train loss did not drop: {first} -> {last}");
        assert!(report.best_val_loss().is_some());
        assert!(report.test_loss.is_none());
        assert_eq!(ckpt.latest_epoch().unwrap(), 5);
    }

    #[test]
    fn test_empty_validation_logs_nan() {
        let device  = Default::default();
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new::<EpochMetrics>(dir.path(), "metrics.csv").unwrap();
        let split   = CorpusSplit { train: repeated(4), validation: vec![], test: repeated(2) };

        let (_, report) =
            train(tiny_model(&device), &settings(1), split, &ckpt, &metrics, &device).unwrap();

        assert!(report.epochs[0].val_loss.is_nan());
        assert!(report.best_val_loss().is_none());
        assert!(report.test_loss.is_some());
    }

    #[test]
    fn test_evaluate_empty_is_none() {
        let device = Default::default();
        let model  = tiny_model(&device).valid();
        assert!(evaluate(&model, &[], 4, 8, &device).is_none());
    }

    #[test]
    fn test_evaluate_weights_batches_by_target_tokens() {
        let device  = Default::default();
        let model   = tiny_model(&device).valid();
        let samples = vec![
            TokenSequence::new(vec![2, 3, 4, 5, 6, 7, 8, 9], 0),
            TokenSequence::new(vec![4, 5], 0),
        ];

        let batcher = LmBatcher::new(8);
        let long: f64 = next_token_loss(&model, &batcher.collate(&samples[..1], &device))
            .into_scalar()
            .elem();
        let short: f64 = next_token_loss(&model, &batcher.collate(&samples[1..], &device))
            .into_scalar()
            .elem();
        let expected = (long * 7.0 + short) / 8.0;

        let pooled = evaluate(&model, &samples, 1, 8, &device).unwrap();
        assert!((pooled - expected).abs() < 1e-4, "{pooled} vs {expected}");

        let together = evaluate(&model, &samples, 2, 8, &device).unwrap();
        assert!((together - expected).abs() < 1e-4, "{together} vs {expected}");
    }
}
