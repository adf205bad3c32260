// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Commands:
//   train              - train the Siamese network
//   evaluate           - report a checkpoint on validation pairs
//   verify             - same person or not, as JSON
//   similarity         - raw similarity and distance, as JSON
//   dataset split      - build train/ and val/ from a raw corpus
//   dataset analyze    - per-split statistics
//
// Exit status: 0 success, 2 configuration error, 1 anything else.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use crate::domain::error::FaceVerifyError;
use crate::infra::config::AppConfig;
use commands::{AnalyzeArgs, Commands, DatasetCommands, EvaluateArgs, PairArgs, SplitArgs, TrainArgs, VerifyArgs};

#[derive(Parser, Debug)]
#[command(
    name = "face-verify",
    version,
    about = "Train a Siamese face-embedding network and verify face pairs."
)]
pub struct Cli {
    /// TOML configuration file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Exit status for a failed run: configuration problems are told apart
/// from runtime failures.
pub fn exit_code(err: &anyhow::Error) -> ExitCode {
    let is_config = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<FaceVerifyError>())
        .any(FaceVerifyError::is_fatal_config);
    if is_config {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

impl Cli {
    /// Load the configuration, then route to the matching use case.
    /// This keeps the CLI layer thin; it only routes, never computes.
    pub fn run(self) -> Result<()> {
        let config = AppConfig::load(Some(self.config.as_path()))
            .with_context(|| format!("Cannot load config '{}'", self.config.display()))?;

        match self.command {
            Commands::Train(args)      => run_train(config, args),
            Commands::Evaluate(args)   => run_evaluate(config, args),
            Commands::Verify(args)     => run_verify(config, args),
            Commands::Similarity(args) => run_similarity(config, args),
            Commands::Dataset(DatasetCommands::Split(args))   => run_split(args),
            Commands::Dataset(DatasetCommands::Analyze(args)) => run_analyze(args),
        }
    }
}

fn run_train(config: AppConfig, args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let use_case = TrainUseCase::new(config, args.into());
    tracing::info!(
        "Starting training on '{}' (validation '{}')",
        use_case.config().data.train_dir.display(),
        use_case.config().data.val_dir.display()
    );

    let summary = use_case.execute()?;
    println!(
        "Training complete: best val_loss {:.4}, best val_acc {:.3} at threshold {:.4}",
        summary.best_val_loss, summary.best_val_accuracy, summary.best_threshold
    );
    Ok(())
}

fn run_evaluate(mut config: AppConfig, args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    if let Some(dir) = args.val_dir {
        config.data.val_dir = dir;
    }
    let report = EvaluateUseCase::new(config, args.checkpoint).execute()?;
    print_json(&report)
}

fn run_verify(config: AppConfig, args: VerifyArgs) -> Result<()> {
    use crate::application::verify_use_case::VerifyUseCase;

    let use_case = VerifyUseCase::new(config, args.pair.checkpoint.clone());
    let verdict  = use_case.verify(&args.pair.request(), args.rule.into(), args.threshold)?;
    tracing::info!("Verdict: {}", if verdict.is_match() { "same person" } else { "different people" });
    print_json(&verdict)
}

fn run_similarity(config: AppConfig, args: PairArgs) -> Result<()> {
    use crate::application::verify_use_case::VerifyUseCase;

    let use_case = VerifyUseCase::new(config, args.checkpoint.clone());
    let report   = use_case.similarity(&args.request())?;
    print_json(&report)
}

fn run_split(args: SplitArgs) -> Result<()> {
    use crate::application::dataset_use_case::split_dataset;

    let summary = split_dataset(&args.into())?;
    print_json(&summary)
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    use crate::application::dataset_use_case::analyze_dataset;

    for stats in analyze_dataset(&args.dataset)? {
        println!("{} set: {} identities, {} images", stats.split, stats.identities, stats.images);
        for (name, count) in &stats.per_identity {
            println!("  {name}: {count} images");
        }
        if stats.is_balanced() {
            println!("  balanced: {} images per identity", stats.max_images);
        } else {
            println!(
                "  class imbalance: {}-{} images per identity",
                stats.min_images, stats.max_images
            );
        }
    }
    Ok(())
}
