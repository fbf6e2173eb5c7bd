// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains a model from a JSON run config
//   2. `eval`  — scores a checkpoint on the dev or test split

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "attr-rewrite",
    version = "0.1.0",
    about = "Train and evaluate attribute-conditioned sentence rewriting models."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args)  => run_eval(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    TrainUseCase::new(args.config, args.bleu).execute()?;
    println!("Training complete.");
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let report = EvalUseCase::new(args.config, args.checkpoint, args.test).execute()?;
    println!(
        "BLEU: {:.4}  edit distance: {:.4}  precision: {:.4}  recall: {:.4}",
        report.bleu, report.edit_distance, report.precision, report.recall,
    );
    Ok(())
}
