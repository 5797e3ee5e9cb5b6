//! casefile: validate, emit and list declaration manifests
//!
//! Manifests are the scanner's per-unit JSON output (annotations plus the
//! structural shape of each annotated function).
//!
//! ## Example Usage
//!
//! ```bash
//! # Validate every declaration and check cross-unit name collisions
//! casefile check build/manifests/*.json
//!
//! # Write the sorted record descriptors
//! casefile emit build/manifests/*.json --out records.json
//!
//! # Show what a runner would select
//! casefile list build/manifests/*.json --tag fast
//! ```

use clap::{Parser, Subcommand};

mod casefile_cli;

use casefile::logging::init_logging;
use casefile_cli::{check::CheckCmd, emit::EmitCmd, list::ListCmd};
use casefile_core::ExitStatus;

#[derive(Parser)]
#[command(
    name = "casefile",
    author,
    version,
    about = "Declaration manifest tool",
    long_about = "Validates annotated declarations, detects duplicate case names across units,\n\
                  and emits or lists the registration records a runner would see."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate manifests and check for duplicate case names
    Check(CheckCmd),

    /// Write the sorted record descriptors as JSON
    Emit(EmitCmd),

    /// List the cases a runner would select
    List(ListCmd),
}

fn main() {
    let Cli {
        command,
        json,
        verbose,
    } = Cli::parse();
    init_logging(verbose);

    let result = match command {
        Commands::Check(cmd) => cmd.execute(json),
        Commands::Emit(cmd) => cmd.execute(),
        Commands::List(cmd) => cmd.execute(json),
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            eprint!("{}", casefile_cli::format_error(&err, json));
            ExitStatus::Error.code()
        }
    };
    std::process::exit(code);
}
