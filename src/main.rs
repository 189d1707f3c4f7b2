//! CLI binary for the recurring task tracker.
//!
//! This binary is a thin wrapper that parses arguments and delegates to the
//! library.

use std::process::ExitCode;

use clap::Parser;
use recurring_tasks::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let base_dir = std::env::current_dir().unwrap_or_default();

    let output = recurring_tasks::cli::run(cli.command, &base_dir);

    for line in output.stdout {
        println!("{line}");
    }
    for msg in output.stderr {
        eprintln!("{msg}");
    }

    output.exit_code
}
