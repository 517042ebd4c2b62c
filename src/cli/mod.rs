// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, built with clap.
// All business logic is delegated to Layer 2 (application).
//
// Commands:
//   1. `prepare`     build vocabulary + tokenizer, print stats
//   2. `train`       supervised next-token training
//   3. `meta-train`  first-order MAML across documents
//   4. `generate`    continue a prompt from a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, GenerateArgs, MetaTrainArgs, PrepareArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "dualm",
    version = "0.1.0",
    about = "Language modelling on a literary corpus with pluggable attention."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case; this layer only routes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args)   => run_prepare(args),
            Commands::Train(args)     => run_train(args),
            Commands::MetaTrain(args) => run_meta_train(args),
            Commands::Generate(args)  => run_generate(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    use crate::application::corpus::PrepareUseCase;

    let stats = PrepareUseCase::new(args.corpus.into()).execute()?;

    println!("Documents:  {}", stats.documents);
    println!("Sentences:  {}", stats.sentences);
    println!("Vocabulary: {}", stats.vocab_size);
    println!("Tokens:     {}", stats.tokens);
    println!(
        "Sequences:  {} train / {} validation / {} test",
        stats.train, stats.validation, stats.test
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on corpus in: {}", args.corpus.corpus_dir);

    let report = TrainUseCase::new(args.into()).execute()?;

    if let Some(best) = report.best_val_loss() {
        println!("Best validation loss: {:.4} (perplexity {:.2})", best, best.exp());
    }
    if let Some(test) = report.test_loss {
        println!("Test loss: {:.4} (perplexity {:.2})", test, test.exp());
    }
    println!("Training complete. Checkpoint saved.");
    Ok(())
}

fn run_meta_train(args: MetaTrainArgs) -> Result<()> {
    use crate::application::meta_train_use_case::MetaTrainUseCase;

    tracing::info!("Starting meta-training on corpus in: {}", args.corpus.corpus_dir);

    let rows = MetaTrainUseCase::new(args.into()).execute()?;

    if let Some(last) = rows.last() {
        println!("Final query loss: {:.4}", last.query_loss);
    }
    println!("Meta-training complete. Checkpoint saved.");
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    use crate::application::generate_use_case::GenerateUseCase;

    let use_case = GenerateUseCase::new(&args.checkpoint_dir)?;
    let text     = use_case.generate(&args.prompt, args.max_new_tokens)?;

    println!("\n{} {}", args.prompt, text);
    Ok(())
}
