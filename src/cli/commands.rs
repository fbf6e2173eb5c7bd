// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `eval`.
// Hyperparameters live in the JSON run config, so the flags
// only pick the config and the validation mode.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a rewriting model from a JSON run config
    Train(TrainArgs),

    /// Score a trained checkpoint on the dev or test split
    Eval(EvalArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Path to the JSON run configuration
    #[arg(long)]
    pub config: PathBuf,

    /// Validate with decoding + BLEU instead of retrieval loss
    #[arg(long)]
    pub bleu: bool,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Path to the JSON run configuration
    #[arg(long)]
    pub config: PathBuf,

    /// Checkpoint file; defaults to the newest one in working_dir
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Use data.src_test / data.tgt_test instead of the dev split
    #[arg(long)]
    pub test: bool,
}
