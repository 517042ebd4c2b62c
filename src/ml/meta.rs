// ============================================================
// Layer 5 - Meta-Learner (first-order MAML)
// ============================================================
// Each document of the corpus is one task. A meta-iteration:
//
//   for task in meta-batch:
//     adapted = meta_model.clone()              snapshot
//     repeat inner_steps:
//       adapted = sgd(adapted, support loss)    inner loop
//     g_task  = ∇ query_loss(adapted)           first-order
//   meta_model = adam(meta_model, Σ g_task, meta_lr / tasks)
//
// The clone is the implicit state restore: weights updated in
// the inner loop never reach the meta-model. Gradients are keyed
// by ParamId, and the inner optimizer keeps ids, so the adapted
// copy's query gradients apply directly to the meta-model.
//
// Reference: Finn et al. (2017) MAML, Nichol et al. (2018) FOMAML

use anyhow::{ensure, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsAccumulator, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::batcher::LmBatcher;
use crate::domain::sample::TokenSequence;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{MetaMetrics, MetricsLogger},
};
use crate::ml::model::{next_token_loss, LanguageModel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaSettings {
    pub inner_steps:      usize,
    pub inner_lr:         f64,
    pub meta_lr:          f64,
    pub meta_batch_size:  usize,
    pub meta_iterations:  usize,
    /// Sequences per inner step and per query evaluation
    pub batch_size:       usize,
    pub max_seq_len:      usize,
    pub seed:             u64,
}

/// One adaptation problem: a support set to adapt on and a
/// disjoint query set to judge the adaptation.
#[derive(Debug, Clone)]
pub struct MetaTask {
    pub id:      usize,
    pub support: Vec<TokenSequence>,
    pub query:   Vec<TokenSequence>,
}

/// Split each (task id, sequences) group into support and query.
/// Groups with fewer than two sequences cannot provide both and
/// are skipped.
pub fn build_tasks(
    groups:           Vec<(usize, Vec<TokenSequence>)>,
    support_fraction: f64,
) -> Result<Vec<MetaTask>> {
    ensure!(
        support_fraction > 0.0 && support_fraction < 1.0,
        "support_fraction must be in (0, 1), got {support_fraction}"
    );

    let mut tasks = Vec::with_capacity(groups.len());
    for (id, mut sequences) in groups {
        let n = sequences.len();
        if n < 2 {
            tracing::warn!("Skipping task {}: {} sequence(s), need at least 2", id, n);
            continue;
        }

        let n_support = ((n as f64 * support_fraction).round() as usize).clamp(1, n - 1);
        let query     = sequences.split_off(n_support);
        tracing::debug!("Task {}: {} support, {} query", id, n_support, query.len());

        tasks.push(MetaTask { id, support: sequences, query });
    }

    ensure!(!tasks.is_empty(), "No task has enough sequences for meta-learning");
    Ok(tasks)
}

/// Inner loop: `inner_steps` plain SGD steps on a clone of `model`.
/// `model` itself is left untouched.
pub fn adapt<B, M>(model: &M, task: &MetaTask, settings: &MetaSettings, device: &B::Device) -> M
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + LanguageModel<B>,
{
    let batcher   = LmBatcher::new(settings.max_seq_len);
    let mut sgd   = SgdConfig::new().init();
    let mut fast  = model.clone();

    for step in 0..settings.inner_steps {
        let items = cyclic_window(&task.support, step, settings.batch_size);
        let batch = batcher.collate::<B>(&items, device);
        let loss  = next_token_loss(&fast, &batch);

        let grads = GradientsParams::from_grads(loss.backward(), &fast);
        fast = sgd.step(settings.inner_lr, fast, grads);
    }

    fast
}

/// One outer update over `tasks`. Returns the updated meta-model and
/// the mean query loss of the adapted copies.
///
/// `round` picks which query window is scored, so successive
/// iterations walk through the whole query set.
pub fn meta_step<B, M, O>(
    model:    M,
    optim:    &mut O,
    tasks:    &[&MetaTask],
    round:    usize,
    settings: &MetaSettings,
    device:   &B::Device,
) -> Result<(M, f64)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + LanguageModel<B>,
    O: Optimizer<M, B>,
{
    ensure!(!tasks.is_empty(), "Meta-batch is empty");

    let batcher         = LmBatcher::new(settings.max_seq_len);
    let mut accumulator = GradientsAccumulator::<M>::new();
    let mut query_sum   = 0.0f64;

    for task in tasks {
        let adapted = adapt::<B, M>(&model, task, settings, device);

        let items = cyclic_window(&task.query, round, settings.batch_size);
        let batch = batcher.collate::<B>(&items, device);
        let loss  = next_token_loss(&adapted, &batch);
        query_sum += loss.clone().into_scalar().elem::<f64>();

        let grads = GradientsParams::from_grads(loss.backward(), &adapted);
        accumulator.accumulate(&adapted, grads);
    }

    let n     = tasks.len() as f64;
    let model = optim.step(settings.meta_lr / n, model, accumulator.grads());
    Ok((model, query_sum / n))
}

/// Outer loop: `meta_iterations` meta-steps over seeded random
/// meta-batches, with a metrics row and checkpoint per iteration.
pub fn run<B, M>(
    model:    M,
    tasks:    &[MetaTask],
    settings: &MetaSettings,
    ckpt:     &CheckpointManager,
    metrics:  &MetricsLogger,
    device:   &B::Device,
) -> Result<(M, Vec<MetaMetrics>)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + LanguageModel<B>,
{
    ensure!(!tasks.is_empty(), "No tasks to meta-train on");
    ensure!(settings.meta_batch_size > 0, "meta_batch_size must be positive");
    ensure!(settings.batch_size > 0, "batch_size must be positive");

    tracing::info!(
        "Meta-training on {} tasks: {} iterations, meta-batch {}, {} inner steps",
        tasks.len(),
        settings.meta_iterations,
        settings.meta_batch_size,
        settings.inner_steps
    );

    let mut rng   = StdRng::seed_from_u64(settings.seed);
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut model = model;
    let mut rows  = Vec::with_capacity(settings.meta_iterations);

    let take = settings.meta_batch_size.min(tasks.len());

    for iteration in 1..=settings.meta_iterations {
        let batch: Vec<&MetaTask> = tasks.choose_multiple(&mut rng, take).collect();

        let (next, query_loss) = meta_step::<B, M, _>(model, &mut optim, &batch, iteration - 1, settings, device)?;
        model = next;

        println!(
            "Meta-iter {:>4}/{} | tasks={} | query_loss={:.4}",
            iteration, settings.meta_iterations, batch.len(), query_loss,
        );

        let row = MetaMetrics { iteration, tasks: batch.len(), query_loss };
        metrics.log(&row)?;
        ckpt.save_model(&model, iteration)?;
        rows.push(row);
    }

    tracing::info!("Meta-training complete!");
    Ok((model, rows))
}

/// `size` items starting at `step * size`, wrapping around `items`.
fn cyclic_window(items: &[TokenSequence], step: usize, size: usize) -> Vec<TokenSequence> {
    let size  = size.min(items.len()).max(1);
    let start = step * size;
    (0..size)
        .map(|i| items[(start + i) % items.len()].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::attention::AttentionKind;
    use crate::ml::model::{Dualm, DualmConfig};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> Dualm<TestBackend> {
        DualmConfig::new(12, 8, 16, 2, 1, 32, AttentionKind::Local)
            .with_dropout(0.0)
            .init(device)
            .unwrap()
    }

    fn settings() -> MetaSettings {
        MetaSettings {
            inner_steps: 3,
            inner_lr: 0.1,
            meta_lr: 1e-2,
            meta_batch_size: 2,
            meta_iterations: 2,
            batch_size: 4,
            max_seq_len: 8,
            seed: 3,
        }
    }

    fn seqs(task: usize, n: usize) -> Vec<TokenSequence> {
        (0..n)
            .map(|i| TokenSequence::new(vec![2, 3 + (i % 4) as u32, 4, 5, 6, 7], task))
            .collect()
    }

    fn head_weights(model: &Dualm<TestBackend>) -> Vec<f32> {
        model.head.weight.val().into_data().to_vec().unwrap()
    }

    #[test]
    fn test_build_tasks_skips_singletons() {
        let groups = vec![(0, seqs(0, 1)), (1, seqs(1, 4)), (2, seqs(2, 10))];
        let tasks  = build_tasks(groups, 0.5).unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, 1);
        assert_eq!((tasks[0].support.len(), tasks[0].query.len()), (2, 2));
        assert_eq!((tasks[1].support.len(), tasks[1].query.len()), (5, 5));
    }

    #[test]
    fn test_build_tasks_keeps_one_query_sequence() {
        let tasks = build_tasks(vec![(0, seqs(0, 2))], 0.9).unwrap();
        assert_eq!((tasks[0].support.len(), tasks[0].query.len()), (1, 1));
    }

    #[test]
    fn test_build_tasks_errors_without_eligible_task() {
        assert!(build_tasks(vec![(0, seqs(0, 1))], 0.5).is_err());
        assert!(build_tasks(vec![(0, seqs(0, 4))], 1.0).is_err());
    }

    #[test]
    fn test_adapt_lowers_support_loss_and_keeps_snapshot() {
        let device = Default::default();
        let model  = tiny_model(&device);
        let task   = build_tasks(vec![(0, seqs(0, 8))], 0.5).unwrap().remove(0);
        let before = head_weights(&model);

        let batcher = LmBatcher::new(8);
        let batch   = batcher.collate::<TestBackend>(&task.support, &device);
        let initial: f64 = next_token_loss(&model, &batch).into_scalar().elem();

        let mut cfg = settings();
        cfg.inner_steps = 10;
        let adapted = adapt(&model, &task, &cfg, &device);
        let after: f64 = next_token_loss(&adapted, &batch).into_scalar().elem();

        assert!(after < initial, "support loss did not drop: {initial} -> {after}");
        assert_eq!(head_weights(&model), before);
    }

    #[test]
    fn test_run_updates_meta_parameters() {
        let device  = Default::default();
        let dir     = tempfile::tempdir().unwrap();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new::<MetaMetrics>(dir.path(), "meta_metrics.csv").unwrap();
        let tasks   = build_tasks(vec![(0, seqs(0, 6)), (1, seqs(1, 6)), (2, seqs(2, 6))], 0.5)
            .unwrap();

        let model  = tiny_model(&device);
        let before = head_weights(&model);

        let (model, rows) = run(model, &tasks, &settings(), &ckpt, &metrics, &device).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.tasks == 2 && r.query_loss.is_finite()));
        assert_ne!(head_weights(&model), before);
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
    }

    #[test]
    fn test_cyclic_window_wraps() {
        let items  = seqs(0, 3);
        let window = cyclic_window(&items, 1, 2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].ids, items[2].ids);
        assert_eq!(window[1].ids, items[0].ids);
    }

    #[test]
    fn test_query_windows_rotate_across_rounds() {
        let query: Vec<TokenSequence> = (0..6)
            .map(|i| TokenSequence::new(vec![2, 3 + i as u32], 0))
            .collect();

        let first  = cyclic_window(&query, 0, 2);
        let second = cyclic_window(&query, 1, 2);
        let ids = |w: &[TokenSequence]| w.iter().map(|s| s.ids.clone()).collect::<Vec<_>>();

        assert_ne!(ids(&first), ids(&second));
        assert_eq!(ids(&second), ids(&query[2..4]));
    }

    #[test]
    fn test_meta_step_scores_a_different_query_window_each_round() {
        let device = Default::default();
        let mut query = seqs(0, 2);
        query.extend((0..2).map(|_| TokenSequence::new(vec![9, 9, 9, 9, 9, 9], 0)));
        let task = MetaTask { id: 0, support: seqs(0, 2), query };

        let mut cfg = settings();
        cfg.batch_size  = 2;
        cfg.inner_steps = 0;
        cfg.meta_lr     = 0.0;

        let model     = tiny_model(&device);
        let mut optim = SgdConfig::new().init();
        let (model, first) = meta_step::<TestBackend, _, _>(model, &mut optim, &[&task], 0, &cfg, &device)
            .unwrap();
        let (_, second) = meta_step::<TestBackend, _, _>(model, &mut optim, &[&task], 1, &cfg, &device)
            .unwrap();

        assert!((first - second).abs() > 1e-6, "same query loss in both rounds: {first}");
    }
}
