use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use casefile::manifest::load_units;
use casefile_core::report::format_listing;
use casefile_core::runner::{select, KindFilter, Selection};
use casefile_core::{ExitStatus, Registry};

#[derive(Parser, Debug)]
pub struct ListCmd {
    /// Declaration manifests (JSON)
    #[arg(required = true, value_name = "MANIFEST")]
    manifests: Vec<PathBuf>,

    /// Glob (`*`, `?`) or substring over `suite/name`
    #[arg(long, value_name = "PATTERN")]
    filter: Option<String>,

    /// Only cases of this suite. Can be provided multiple times.
    #[arg(long, value_name = "SUITE")]
    suite: Vec<String>,

    /// Only cases carrying every listed tag
    #[arg(long, value_name = "TAG")]
    tag: Vec<String>,

    /// Case kind: all, test, fuzz, bench, jitter or baseline
    #[arg(long, default_value = "all")]
    kind: KindFilter,
}

impl ListCmd {
    pub fn execute(&self, json_output: bool) -> Result<i32> {
        let registry = match Registry::aggregate(load_units(&self.manifests)?) {
            Ok(registry) => registry,
            Err(e) => {
                eprintln!("{}", e);
                return Ok(ExitStatus::Error.code());
            }
        };
        let selection = Selection {
            suites: self.suite.clone(),
            tags: self.tag.clone(),
            filter: self.filter.clone(),
            kind: self.kind,
            ..Default::default()
        };
        let selected = select(&registry, &selection)?;
        let listing = format_listing(&selected, json_output)?;
        if json_output {
            println!("{}", listing);
        } else {
            print!("{}", listing);
        }
        Ok(ExitStatus::Success.code())
    }
}
