// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and all their flags. Flags shared
// by several commands live in CorpusArgs and ModelArgs and are
// flattened into each command.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, AttentionKind, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    corpus::CorpusConfig,
    meta_train_use_case::MetaTrainConfig,
    model_spec::{Architecture, ModelOptions},
    train_use_case::TrainConfig,
};
use crate::ml::{attention::AttentionKind, layers::LayerRouting};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the vocabulary and tokenizer, and report corpus statistics
    Prepare(PrepareArgs),

    /// Train a DUALM language model on the corpus
    Train(TrainArgs),

    /// Meta-train across documents with first-order MAML
    MetaTrain(MetaTrainArgs),

    /// Continue a prompt with a trained checkpoint
    Generate(GenerateArgs),
}

// ─── Shared flags ─────────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct CorpusArgs {
    /// Directory containing the .txt corpus
    #[arg(long, default_value = "data/corpus")]
    pub corpus_dir: String,

    /// Directory for checkpoints, tokenizer, and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Vocabulary capacity, [PAD] and [UNK] included
    #[arg(long, default_value_t = 10_000)]
    pub vocab_size: usize,

    /// Tokens the model sees per sequence
    #[arg(long, default_value_t = 64)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 0.1)]
    pub validation_fraction: f64,

    /// Seed for the split, shuffling, and task sampling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<CorpusArgs> for CorpusConfig {
    fn from(a: CorpusArgs) -> Self {
        CorpusConfig {
            corpus_dir:          a.corpus_dir,
            checkpoint_dir:      a.checkpoint_dir,
            vocab_size:          a.vocab_size,
            max_seq_len:         a.max_seq_len,
            train_fraction:      a.train_fraction,
            validation_fraction: a.validation_fraction,
            seed:                a.seed,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// dualm or hierarchical
    #[arg(long, default_value = "dualm")]
    pub architecture: Architecture,

    /// Attention of every DUALM layer: global, local, sparse, or diverse
    #[arg(long, default_value = "global")]
    pub attention: AttentionKind,

    /// Comma-separated routing per hierarchical level,
    /// each an attention kind or "dynamic"
    #[arg(long, value_delimiter = ',', default_value = "local,dynamic,global")]
    pub levels: Vec<LayerRouting>,

    /// Hidden dimension; must be even and divisible by num_heads
    #[arg(long, default_value_t = 128)]
    pub d_model: usize,

    #[arg(long, default_value_t = 4)]
    pub num_heads: usize,

    /// Encoder blocks in a DUALM model
    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 512)]
    pub d_ff: usize,

    /// Local attention window, the query position included
    #[arg(long, default_value_t = 16)]
    pub window: usize,

    /// Scores kept per query by sparse attention
    #[arg(long, default_value_t = 8)]
    pub top_k: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Dynamic levels use global attention up to this length
    #[arg(long, default_value_t = 32)]
    pub global_max_len: usize,

    /// Dynamic levels use local attention up to this length, sparse beyond
    #[arg(long, default_value_t = 48)]
    pub local_max_len: usize,
}

impl From<ModelArgs> for ModelOptions {
    fn from(a: ModelArgs) -> Self {
        ModelOptions {
            architecture:   a.architecture,
            attention:      a.attention,
            levels:         a.levels,
            d_model:        a.d_model,
            num_heads:      a.num_heads,
            num_layers:     a.num_layers,
            d_ff:           a.d_ff,
            window:         a.window,
            top_k:          a.top_k,
            dropout:        a.dropout,
            global_max_len: a.global_max_len,
            local_max_len:  a.local_max_len,
        }
    }
}

// ─── prepare ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 3e-4)]
    pub lr: f64,

    /// DataLoader worker threads
    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            corpus:      a.corpus.into(),
            model:       a.model.into(),
            epochs:      a.epochs,
            batch_size:  a.batch_size,
            lr:          a.lr,
            num_workers: a.num_workers,
        }
    }
}

// ─── meta-train ───────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct MetaTrainArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Sequences per inner step and per query evaluation
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// SGD steps on each task's support set
    #[arg(long, default_value_t = 5)]
    pub inner_steps: usize,

    #[arg(long, default_value_t = 1e-2)]
    pub inner_lr: f64,

    /// Adam learning rate of the outer update
    #[arg(long, default_value_t = 1e-3)]
    pub meta_lr: f64,

    /// Tasks per outer update
    #[arg(long, default_value_t = 4)]
    pub meta_batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub meta_iterations: usize,

    /// Share of each task's sequences used for adaptation
    #[arg(long, default_value_t = 0.5)]
    pub support_fraction: f64,

    /// Start from the latest checkpoint instead of fresh weights
    #[arg(long)]
    pub resume: bool,
}

impl From<MetaTrainArgs> for MetaTrainConfig {
    fn from(a: MetaTrainArgs) -> Self {
        MetaTrainConfig {
            corpus:           a.corpus.into(),
            model:            a.model.into(),
            batch_size:       a.batch_size,
            inner_steps:      a.inner_steps,
            inner_lr:         a.inner_lr,
            meta_lr:          a.meta_lr,
            meta_batch_size:  a.meta_batch_size,
            meta_iterations:  a.meta_iterations,
            support_fraction: a.support_fraction,
            resume:           a.resume,
        }
    }
}

// ─── generate ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Text to continue
    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value_t = 20)]
    pub max_new_tokens: usize,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_parse_into_config() {
        let cli = Cli::try_parse_from([
            "dualm", "train",
            "--architecture", "hierarchical",
            "--levels", "sparse,dynamic",
            "--epochs", "3",
        ])
        .unwrap();

        let Commands::Train(args) = cli.command else {
            panic!("expected train command");
        };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.model.architecture, Architecture::Hierarchical);
        assert_eq!(
            cfg.model.levels,
            vec![LayerRouting::Fixed(AttentionKind::Sparse), LayerRouting::Dynamic]
        );
        assert_eq!(cfg.corpus.max_seq_len, 64);
    }

    #[test]
    fn test_rejects_unknown_attention() {
        assert!(Cli::try_parse_from(["dualm", "train", "--attention", "linear"]).is_err());
    }

    #[test]
    fn test_meta_train_resume_flag() {
        let cli = Cli::try_parse_from(["dualm", "meta-train", "--resume", "--inner-steps", "2"])
            .unwrap();
        let Commands::MetaTrain(args) = cli.command else {
            panic!("expected meta-train command");
        };
        let cfg: MetaTrainConfig = args.into();
        assert!(cfg.resume);
        assert_eq!(cfg.inner_steps, 2);
    }
}
