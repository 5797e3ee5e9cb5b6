use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use casefile::manifest::load_units;
use casefile_core::{ExitStatus, RecordDescriptor};

use super::{format_problems, problems};

#[derive(Parser, Debug)]
pub struct EmitCmd {
    /// Declaration manifests (JSON)
    #[arg(required = true, value_name = "MANIFEST")]
    manifests: Vec<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, short, value_name = "PATH")]
    out: Option<PathBuf>,
}

impl EmitCmd {
    pub fn execute(&self) -> Result<i32> {
        let units = load_units(&self.manifests)?;
        let (diagnostics, collisions) = problems(&units);
        if !diagnostics.is_empty() || !collisions.is_empty() {
            eprint!("{}", format_problems(&diagnostics, &collisions));
            return Ok(ExitStatus::Error.code());
        }

        let mut descriptors: Vec<RecordDescriptor> = units
            .iter()
            .flat_map(|u| u.records.iter().map(|r| r.descriptor()))
            .collect();
        descriptors.sort_by(|a, b| a.identity.cmp(&b.identity));
        let json = serde_json::to_string_pretty(&descriptors)?;

        match &self.out {
            Some(path) => {
                fs::write(path, json + "\n")
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("wrote {} record(s) to {}", descriptors.len(), path.display());
            }
            None => println!("{}", json),
        }
        Ok(ExitStatus::Success.code())
    }
}
