use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use casefile::manifest::load_units;
use casefile_core::ExitStatus;

use super::{format_problems, problems};

#[derive(Parser, Debug)]
pub struct CheckCmd {
    /// Declaration manifests (JSON)
    #[arg(required = true, value_name = "MANIFEST")]
    manifests: Vec<PathBuf>,
}

#[derive(Serialize)]
struct CheckJson {
    units: usize,
    cases: usize,
    errors: Vec<ProblemJson>,
}

#[derive(Serialize)]
struct ProblemJson {
    file: String,
    line: u32,
    rule: String,
    message: String,
}

impl CheckCmd {
    pub fn execute(&self, json_output: bool) -> Result<i32> {
        let units = load_units(&self.manifests)?;
        let (diagnostics, collisions) = problems(&units);
        let cases: usize = units.iter().map(|u| u.records.len()).sum();
        let failed = !diagnostics.is_empty() || !collisions.is_empty();

        if json_output {
            let mut errors: Vec<ProblemJson> = diagnostics
                .iter()
                .map(|d| ProblemJson {
                    file: d.location.file.clone(),
                    line: d.location.line,
                    rule: d.rule.clone(),
                    message: d.message.clone(),
                })
                .collect();
            errors.extend(collisions.iter().map(|c| ProblemJson {
                file: c.second.location.file.clone(),
                line: c.second.location.line,
                rule: "DuplicateName".to_string(),
                message: c.to_string(),
            }));
            let report = CheckJson {
                units: units.len(),
                cases,
                errors,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if failed {
            eprint!("{}", format_problems(&diagnostics, &collisions));
            eprintln!(
                "{} error(s) in {} unit(s)",
                diagnostics.len() + collisions.len(),
                units.len()
            );
        } else {
            println!("ok: {} case(s) in {} unit(s)", cases, units.len());
        }

        Ok(if failed {
            ExitStatus::Error.code()
        } else {
            ExitStatus::Success.code()
        })
    }
}
