//! Entry point for case runner binaries.
//!
//! A runner binary registers its units and hands them to [`run_main`],
//! which parses the command line, aggregates the registry, runs the
//! selection and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use casefile_core::report::{format_listing, format_report, format_report_json, write_junit};
use casefile_core::runner::{self, select, ExitStatus};
use casefile_core::{Registry, UnitRecords};

use crate::args::RunnerArgs;
use crate::logging::init_logging;

/// Parse the process arguments, run, and return the exit code.
pub fn run_main(units: Vec<UnitRecords>) -> i32 {
    let args = RunnerArgs::parse();
    init_logging(args.verbose);
    match run_with_args(&args, units) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitStatus::Error.code()
        }
    }
}

/// Run with already parsed arguments. Registration and usage errors are
/// reported on stderr and map to exit code 2.
pub fn run_with_args(args: &RunnerArgs, units: Vec<UnitRecords>) -> Result<i32> {
    let registry = match Registry::aggregate(units) {
        Ok(registry) => registry,
        Err(e) => {
            error!("registration failed");
            eprintln!("{}", e);
            return Ok(ExitStatus::Error.code());
        }
    };
    let config = args.to_run_config();

    if args.list {
        let selected = match select(&registry, &config.selection) {
            Ok(selected) => selected,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Ok(ExitStatus::Error.code());
            }
        };
        print!("{}", format_listing(&selected, args.json)?);
        if args.json {
            println!();
        }
        return Ok(ExitStatus::Success.code());
    }

    let report = match runner::run(&registry, &config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitStatus::Error.code());
        }
    };

    if args.json {
        println!("{}", format_report_json(&report)?);
    } else {
        print!("{}", format_report(&report, args.color()));
    }
    if let Some(path) = &args.junit {
        write_junit(&report, path)
            .with_context(|| format!("Failed to write --junit {}", path.display()))?;
    }
    Ok(report.exit_code())
}
