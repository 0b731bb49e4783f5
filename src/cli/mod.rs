// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to
// its use case in Layer 2:
//   1. `train`    - trains on .npz arrays, checkpoints each epoch
//   2. `evaluate` - scores the latest checkpoint on an .npz archive

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

use crate::application::{
    evaluate_use_case::EvaluateUseCase,
    train_use_case::{TrainConfig, TrainUseCase},
};

#[derive(Parser, Debug)]
#[command(
    name = "squad-rnn-qa",
    version,
    about = "Train and evaluate a recurrent SQuAD answer-token classifier."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The CLI layer only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let cfg = TrainConfig::from(args);
    tracing::info!("Configuration: {:#?}", cfg);

    let stats = TrainUseCase::new(cfg.clone()).execute()?;

    if let Some(last) = stats.epoch_losses.last() {
        println!("Training complete. Final average train loss: {last:.7}");
    }
    println!("Checkpoints and statistics saved in '{}'", cfg.save_dir);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let use_case = EvaluateUseCase::new(args.save_dir, args.data_path.clone(), args.embed_path, args.batch_size);
    let loss = use_case.execute()?;
    println!("Loss on '{}': {loss:.7}", args.data_path);
    Ok(())
}
