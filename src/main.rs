use clap::{CommandFactory, Parser};
use serde_json::Value;
use std::io;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod decode;
mod envelope;
mod error;
mod evaluator;
mod inputs;
mod interrupt;
mod pipeline;
mod sink;
mod split;
mod workload;
mod workspace;

use cli::RootArgs;
use config::Settings;
use error::GatekeeperError;
use evaluator::CommandEvaluator;
use pipeline::{Outcome, Pipeline, INTERNAL_ERROR_EXIT};

/// How long an interrupted run gets to unwind before the handler forces exit.
const INTERRUPT_GRACE: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let args = match RootArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(INTERNAL_ERROR_EXIT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(args.verbose);

    let Some(input) = args.input.clone() else {
        eprintln!("Error: Missing input.\n\nHelp:");
        let _ = RootArgs::command().print_help();
        return ExitCode::from(INTERNAL_ERROR_EXIT);
    };

    if let Err(err) = interrupt::install(INTERRUPT_GRACE, i32::from(INTERNAL_ERROR_EXIT)) {
        tracing::warn!(error = %err, "running without signal handling");
    }

    let outcome = run(&args, &input);
    match &outcome {
        Outcome::Failed(err) => eprintln!("Error: {err}"),
        Outcome::Findings(status) => tracing::info!(status, "evaluator reported findings"),
        Outcome::Success => {}
    }
    ExitCode::from(outcome.exit_code())
}

fn run(args: &RootArgs, input: &str) -> Outcome {
    let settings = match Settings::from_args(args) {
        Ok(settings) => settings,
        Err(err) => return Outcome::Failed(GatekeeperError::InvalidSettings(format!("{err:#}"))),
    };
    let evaluator = match CommandEvaluator::new(settings.evaluator_command, settings.timeout) {
        Ok(evaluator) => evaluator,
        Err(err) => return Outcome::Failed(err),
    };
    let parameters = match &args.parameters {
        Some(path) => match inputs::load_parameters(path) {
            Ok(parameters) => parameters,
            Err(err) => return Outcome::Failed(err),
        },
        None => Value::Null,
    };
    let manifest = match inputs::open_manifest(input) {
        Ok(manifest) => manifest,
        Err(err) => return Outcome::Failed(err),
    };

    let pipeline = Pipeline::new(
        &evaluator,
        settings.max_document_bytes,
        settings.workspace_root,
    );
    pipeline.run(manifest, &parameters, &args.forward, &mut io::stdout().lock())
}

/// Log to stderr so stdout carries only the evaluator's output.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
