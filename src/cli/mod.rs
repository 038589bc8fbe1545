// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`    — trains the tracker, checkpointing on the dev set
//   2. `evaluate` — scores a checkpoint on a labelled dataset
//   3. `predict`  — writes the filled prediction template
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::application::{
    evaluate_use_case::EvaluateUseCase,
    predict_use_case::PredictUseCase,
    train_use_case::TrainUseCase,
};
use crate::ml::trainer::TrainOutcome;
use commands::{Commands, EvaluateArgs, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "propara-tracker",
    version,
    about = "Track entity states and locations through procedural paragraphs."
)]
pub struct Cli {
    /// Also write the log to a timestamped file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Predict(args)  => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!("Starting training on {}", args.train_set.display());

    let outcome = TrainUseCase::new(args.into()).execute()?;
    if let TrainOutcome::EarlyStopped { epoch, .. } = outcome {
        println!("Early stopping in epoch {epoch}.");
    }
    println!("Training complete. Best dev score: {:.2}", outcome.best_score());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let stats = EvaluateUseCase::new(args.model.into(), args.data_set).execute()?;
    println!("{}", stats.summary());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let output = args.output.clone();
    let use_case = PredictUseCase {
        source:      args.model.into(),
        test_set:    args.test_set,
        template:    args.template,
        output:      args.output,
        move_policy: args.move_policy,
    };
    let lines = use_case.execute()?;
    println!("Wrote {lines} predictions to {}", output.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;

    #[test]
    fn test_negative_epochs_mean_unlimited() {
        let cli = Cli::try_parse_from([
            "propara-tracker", "train", "--epochs", "-1", "--impatience", "-1",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.epochs, None);
        assert_eq!(cfg.impatience, None);
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["propara-tracker", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let default = TrainConfig::default();
        assert_eq!(cfg.epochs, default.epochs);
        assert_eq!(cfg.impatience, default.impatience);
        assert_eq!((cfg.batch_size, cfg.hidden_size), (default.batch_size, default.hidden_size));
        assert_eq!(cfg.lr, default.lr);
    }

    #[test]
    fn test_predict_requires_template_and_parses_policy() {
        assert!(Cli::try_parse_from(["propara-tracker", "predict"]).is_err());

        let cli = Cli::try_parse_from([
            "propara-tracker", "--log-dir", "logs", "predict",
            "--template", "t.tsv", "--move-policy", "unknown", "--batch-size", "8",
        ])
        .unwrap();
        assert_eq!(cli.log_dir, Some(PathBuf::from("logs")));
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        assert_eq!(args.move_policy, crate::domain::consistency::MovePolicy::Unknown);
        assert_eq!(args.model.batch_size, Some(8));
    }
}
