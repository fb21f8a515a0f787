//! grove - a content-addressed version control system
//!
//! This is the main entry point for the grove command-line interface.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use grove::cli::{self, Cli};

/// environment variable that overrides the log filter
const LOG_ENV: &str = "GROVE_LOG";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = io::stdout();
    match cli::run(&cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_fatal() {
                tracing::info!(kind = e.kind(), error = ?e, "repository unusable");
            } else {
                tracing::debug!(kind = e.kind(), error = ?e, "command failed");
            }
            eprintln!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
