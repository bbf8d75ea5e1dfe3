// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application); this layer
// only routes and prints results.
//
// Two commands are supported:
//   1. `run`     — the whole experiment: train, evaluate,
//                  visualise, infer, save
//   2. `predict` — load a saved model and classify images
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use commands::{Commands, PredictArgs, RunArgs};

use crate::application::predict_use_case::InferenceReport;

#[derive(Parser, Debug)]
#[command(
    name = "digit-cnn",
    version = "0.1.0",
    about = "Train a convolutional network on MNIST handwritten digits, then classify images."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args)     => run_pipeline(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_pipeline(args: RunArgs) -> Result<()> {
    use crate::application::pipeline_use_case::PipelineUseCase;

    let use_case = PipelineUseCase::new(args.into());
    let outcome  = use_case.execute()?;

    println!("\nTest accuracy: {:.4}%", outcome.test.accuracy * 100.0);
    if let Some(best) = outcome.history.best_epoch() {
        println!("Best validation epoch: {}", best.epoch);
    }
    if let Some(report) = &outcome.inference {
        print_report(report);
    }
    println!("Model saved to {}", outcome.model_path.display());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case = PredictUseCase::new(
        Path::new(&args.model),
        args.images.into(),
        args.output_dir,
        args.grid_cols,
    )?;
    let report   = use_case.execute()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &InferenceReport) {
    println!();
    for r in &report.results {
        let verdict = match r.is_correct() {
            Some(true)  => " (correct)".to_string(),
            Some(false) => r.expected.map(|e| format!(" (expected {e})")).unwrap_or_default(),
            None        => String::new(),
        };
        println!(
            "{:<10} → {}  {:>6.2}%{}",
            r.file_name,
            r.prediction.label,
            r.prediction.confidence() * 100.0,
            verdict
        );
    }
    match report.accuracy() {
        Some(acc) => println!(
            "Accuracy on custom images: {:.2}% ({}/{})",
            acc,
            report.correct(),
            report.labelled()
        ),
        None => println!("No expected labels given; accuracy not computed."),
    }
}
