mod cli;
mod domain;
mod infra;
mod ui;

use crate::cli::CliInvocation;
use std::io::{self, IsTerminal, Write};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TERMLOGS_LOG";

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),
}

fn main() {
    init_tracing();

    if let Err(error) = run_main() {
        let color = crate::ui::should_color_stderr();
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{}", crate::ui::format_error(&error.to_string(), color));
        std::process::exit(1);
    }
}

// Diagnostics go to stderr so stdout stays usable for results.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Command(command) => {
            if io::stderr().is_terminal() {
                let mut err = io::stderr().lock();
                let _ = writeln!(err, "{}", crate::ui::header(crate::ui::should_color_stderr()));
            }
            tracing::debug!(?command, "running command");
            crate::cli::run(command)?;
            Ok(())
        }
    }
}

fn print_help() {
    let text = crate::cli::help_text(env!("CARGO_PKG_NAME"));
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}
