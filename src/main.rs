//! gantry CLI entry point
//!
//! Parses the command line, wires up the console log sink, and runs
//! one bootstrap pass. Any fatal error ends the process with the full
//! diagnostic report: the error chain, a backtrace, and everything the
//! bootstrap had logged up to that point.

use clap::Parser;
use gantry_cli::cli::Cli;
use gantry_cli::core::fatal_report;
use gantry_cli::sink::ConsoleSink;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    // Diagnostics are opt-in and go to stderr; stdout is reserved for
    // the user-visible progress lines.
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }

    let sink = Arc::new(ConsoleSink::new());
    if let Err(error) = cli.execute(sink.clone()).await {
        eprintln!("{}", fatal_report(&error, &sink.transcript()));
        std::process::exit(1);
    }
}
