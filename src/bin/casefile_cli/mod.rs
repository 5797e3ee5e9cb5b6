//! Subcommand implementations for the casefile tool

pub mod check;
pub mod emit;
pub mod list;

use serde::Serialize;

use casefile_core::{detect_collisions, Collision, Contribution, UnitDiagnostic, UnitRecords};

/// Everything wrong with a set of units: validation diagnostics and
/// cross-unit name collisions.
pub fn problems(units: &[UnitRecords]) -> (Vec<UnitDiagnostic>, Vec<Collision>) {
    let diagnostics = units
        .iter()
        .flat_map(|u| u.diagnostics.iter().cloned())
        .collect();
    let collisions = detect_collisions(units.iter().flat_map(|u| {
        u.records.iter().map(|r| {
            (
                r.id(),
                Contribution {
                    unit: r.unit.clone(),
                    location: r.location().clone(),
                },
            )
        })
    }));
    (diagnostics, collisions)
}

/// `file:line: error[Rule]: message` lines.
pub fn format_problems(diagnostics: &[UnitDiagnostic], collisions: &[Collision]) -> String {
    let mut out = String::new();
    for d in diagnostics {
        out.push_str(&format!("{}\n", d));
    }
    for c in collisions {
        out.push_str(&format!(
            "{}: error[DuplicateName]: {}\n",
            c.second.location, c
        ));
    }
    out
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            cause: Option<String>,
        }

        let err = ErrorJson {
            error: error.to_string(),
            cause: error.source().map(|e| e.to_string()),
        };
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string()) + "\n"
    } else {
        let mut out = format!("Error: {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        out
    }
}
