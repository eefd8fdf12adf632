//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, initializes logging, discovers configuration,
//! creates the tokio runtime, dispatches to a command, and owns all error
//! output.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use storyforge_config::{CliArgs, Config};
use storyforge_orchestrator::Orchestrator;
use storyforge_utils::error::{StoryforgeError, contextual_report};
use storyforge_utils::logging::init_tracing;
use storyforge_utils::redaction::redact_error_message;
use storyforge_utils::ExitCode;

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// Prints everything, including errors, and returns the exit code to use on
/// failure. main.rs only calls `std::process::exit`.
pub fn run() -> Result<(), ExitCode> {
    run_with(Cli::parse())
}

pub(crate) fn run_with(cli: Cli) -> Result<(), ExitCode> {
    if let Err(e) = init_tracing(cli.verbose, cli.log_json) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        backends: cli.backends.clone(),
        attempt_timeout_secs: cli.attempt_timeout,
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report(&StoryforgeError::Config(err))),
    };

    let operation = cli.command.name();
    debug!(
        command = operation,
        backends = ?config.generation.backend_order,
        "Configuration loaded"
    );

    let result = match cli.command {
        // config never touches a backend
        Commands::Config { json } => commands::execute_config_command(&config, json),
        command => match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(dispatch(command, &config)),
            Err(e) => {
                eprintln!("Error: failed to create async runtime: {e}");
                return Err(ExitCode::INTERNAL);
            }
        },
    };

    finish(result, operation)
}

async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config);
    match command {
        Commands::Narrative {
            track_id,
            track_title,
            answers,
            answers_file,
            with_image,
        } => {
            let request = commands::build_narrative_request(
                track_id,
                track_title,
                answers_file.as_deref(),
                answers,
            )?;
            commands::execute_narrative_command(&orchestrator, &request, with_image).await
        }
        Commands::Image { request } => {
            commands::execute_image_command(&orchestrator, &request).await
        }
        Commands::Health { breakers } => {
            commands::execute_health_command(&orchestrator, breakers).await
        }
        Commands::Config { json } => commands::execute_config_command(config, json),
    }
}

fn finish(result: Result<()>, operation: &str) -> Result<(), ExitCode> {
    let Err(error) = result else {
        return Ok(());
    };

    if let Some(err) = error.downcast_ref::<StoryforgeError>() {
        return Err(report(err));
    }

    eprintln!(
        "Error: {operation} failed: {}",
        redact_error_message(&format!("{error:#}"))
    );
    eprintln!("\n  Run with --verbose for more detailed output");
    Err(ExitCode::INTERNAL)
}

fn report(err: &StoryforgeError) -> ExitCode {
    eprintln!("{}", redact_error_message(&contextual_report(err)));
    ExitCode::from(err)
}
