//! Run report formatting: human text, JSON and JUnit XML.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use casefile_types::{CaseKind, FixtureLifetime};

use crate::runner::{CaseResultRecord, Outcome, RunReport, Selected};

fn paint(text: &str, code: &str, color: bool) -> String {
    if color {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn outcome_color(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "32",
        Outcome::Failed | Outcome::Crashed | Outcome::TimedOut => "31",
        Outcome::Skipped | Outcome::NotRun => "33",
    }
}

fn result_label(result: &CaseResultRecord, repeated: bool) -> String {
    if repeated {
        format!("{} #{}", result.id, result.attempt)
    } else {
        result.id.to_string()
    }
}

fn format_measurement(result: &CaseResultRecord, out: &mut String) {
    if let Some(bench) = &result.bench {
        if bench.reused {
            let _ = writeln!(
                out,
                "         median {:.1} ns/iter, stddev {:.1} (stored baseline)",
                bench.stats.median, bench.stats.stddev
            );
        } else {
            let _ = writeln!(
                out,
                "         median {:.1} ns/iter, p05 {:.1}, p95 {:.1}, stddev {:.1} ({} epochs x {} iters)",
                bench.stats.median,
                bench.stats.p05,
                bench.stats.p95,
                bench.stats.stddev,
                bench.epochs,
                bench.iters_per_epoch
            );
        }
    }
    if let Some(jitter) = &result.jitter {
        let _ = writeln!(
            out,
            "         median {:.1} ns/call, min {:.1}, max {:.1}, stddev {:.1} ({} samples)",
            jitter.stats.median,
            jitter.stats.min,
            jitter.stats.max,
            jitter.stats.stddev,
            jitter.samples
        );
        for bin in &jitter.histogram {
            let _ = writeln!(
                out,
                "           [{:>12.1}, {:>12.1}) {:>7} {:>6.2}% {:>7.2}%",
                bin.lo, bin.hi, bin.count, bin.pct, bin.cum_pct
            );
        }
    }
    if let Some(cmp) = &result.baseline {
        let _ = writeln!(
            out,
            "         {:+.1}% against baseline {}",
            cmp.delta_pct, cmp.baseline_case
        );
    }
    if let Some(fuzz) = &result.fuzz {
        let _ = writeln!(
            out,
            "         {} inputs ({} replayed, {} seeds), seed {}",
            fuzz.inputs_run(),
            fuzz.replayed,
            fuzz.seeds_run,
            fuzz.seed
        );
        if let Some(path) = fuzz.failure.as_ref().and_then(|f| f.corpus_path.as_ref()) {
            let _ = writeln!(out, "         saved to {}", path.display());
        }
    }
}

/// Human-readable report: one marker line per result, then a summary.
pub fn format_report(report: &RunReport, color: bool) -> String {
    let mut out = String::new();
    let repeated = report.results.iter().any(|r| r.attempt > 0);

    for result in &report.results {
        let marker = paint(result.outcome.marker(), outcome_color(result.outcome), color);
        let _ = write!(out, "{} {}", marker, result_label(result, repeated));
        if result.outcome != Outcome::NotRun && result.outcome != Outcome::Skipped {
            let _ = write!(out, " ({} ms)", result.duration_ms);
        }
        out.push('\n');
        if let Some(reason) = &result.reason {
            let _ = writeln!(out, "         {}", reason);
        }
        if result.outcome.is_failure() {
            for line in result.diagnostics.iter().skip(1) {
                let _ = writeln!(out, "         {}", line);
            }
            for line in &result.logs {
                let _ = writeln!(out, "         | {}", line);
            }
        }
        format_measurement(result, &mut out);
    }

    let c = &report.counts;
    let summary = format!(
        "{} total: {} passed, {} failed, {} crashed, {} timed out, {} skipped, {} not run",
        c.total, c.passed, c.failed, c.crashed, c.timed_out, c.skipped, c.not_run
    );
    out.push('\n');
    let code = if c.failures() > 0 { "31" } else { "32" };
    out.push_str(&paint(&summary, code, color));
    out.push('\n');
    if let Some(seed) = report.seed {
        let _ = writeln!(out, "shuffle seed: {}", seed);
    }
    let failed: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.outcome.is_failure())
        .collect();
    if !failed.is_empty() {
        out.push_str("\nFailures:\n");
        for r in failed {
            let _ = writeln!(out, "  {} {}", r.outcome.marker(), result_label(r, repeated));
        }
    }
    out
}

pub fn format_report_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize run report")
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// JUnit XML: one `<testsuite>` per suite, requirements as properties.
pub fn format_junit(report: &RunReport) -> String {
    let mut suites: Vec<(&str, Vec<&CaseResultRecord>)> = Vec::new();
    for r in &report.results {
        match suites.iter_mut().find(|(s, _)| *s == r.id.suite) {
            Some((_, members)) => members.push(r),
            None => suites.push((r.id.suite.as_str(), vec![r])),
        }
    }

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let c = &report.counts;
    let _ = writeln!(
        out,
        "<testsuites name=\"casefile\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" timestamp=\"{}\">",
        c.total,
        c.failed + c.timed_out,
        c.crashed,
        c.skipped + c.not_run,
        report.started_at.to_rfc3339()
    );
    for (suite, members) in suites {
        let failures = members
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed | Outcome::TimedOut))
            .count();
        let errors = members.iter().filter(|r| r.outcome == Outcome::Crashed).count();
        let skipped = members
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped | Outcome::NotRun))
            .count();
        let time: u64 = members.iter().map(|r| r.duration_ms).sum();
        let _ = writeln!(
            out,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">",
            xml_escape(suite),
            members.len(),
            failures,
            errors,
            skipped,
            time as f64 / 1000.0
        );
        for r in members {
            let name = if r.attempt > 0 {
                format!("{} #{}", r.id.name, r.attempt)
            } else {
                r.id.name.clone()
            };
            let _ = writeln!(
                out,
                "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\">",
                xml_escape(&name),
                xml_escape(suite),
                r.duration_ms as f64 / 1000.0
            );
            if !r.requirements.is_empty() || r.kind != CaseKind::Test {
                out.push_str("      <properties>\n");
                let _ = writeln!(
                    out,
                    "        <property name=\"kind\" value=\"{}\"/>",
                    r.kind.as_str()
                );
                for req in &r.requirements {
                    let _ = writeln!(
                        out,
                        "        <property name=\"requirement\" value=\"{}\"/>",
                        xml_escape(req)
                    );
                }
                out.push_str("      </properties>\n");
            }
            let reason = xml_escape(r.reason.as_deref().unwrap_or(""));
            match r.outcome {
                Outcome::Failed | Outcome::TimedOut => {
                    let _ = writeln!(
                        out,
                        "      <failure type=\"{}\" message=\"{}\">{}</failure>",
                        r.outcome,
                        reason,
                        xml_escape(&r.diagnostics.join("\n"))
                    );
                }
                Outcome::Crashed => {
                    let _ = writeln!(out, "      <error type=\"crashed\" message=\"{}\"/>", reason);
                }
                Outcome::Skipped | Outcome::NotRun => {
                    let _ = writeln!(out, "      <skipped message=\"{}\"/>", reason);
                }
                Outcome::Passed => {}
            }
            if !r.logs.is_empty() {
                let _ = writeln!(
                    out,
                    "      <system-out>{}</system-out>",
                    xml_escape(&r.logs.join("\n"))
                );
            }
            out.push_str("    </testcase>\n");
        }
        out.push_str("  </testsuite>\n");
    }
    out.push_str("</testsuites>\n");
    out
}

pub fn write_junit(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, format_junit(report))
        .with_context(|| format!("Failed to write JUnit report {}", path.display()))
}

#[derive(Debug, Serialize)]
struct ListedCase<'a> {
    identity: String,
    kind: CaseKind,
    tags: Vec<&'a str>,
    requirements: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixture: Option<String>,
    skip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_capabilities: Vec<&'a str>,
}

fn listed<'a>(s: &'a Selected<'_>) -> ListedCase<'a> {
    let case = &s.record.case;
    ListedCase {
        identity: case.id.qualified(),
        kind: case.kind,
        tags: case.tags.iter().map(String::as_str).collect(),
        requirements: case.requirements.iter().map(String::as_str).collect(),
        fixture: case.fixture.as_ref().map(|f| match case.fixture_lifetime {
            FixtureLifetime::PerSuite => format!("{} (suite)", f.name),
            _ => f.name.clone(),
        }),
        skip: case.should_skip,
        skip_reason: case.skip_reason.as_deref(),
        missing_capabilities: s.missing.iter().map(String::as_str).collect(),
    }
}

/// List-mode output for the selected cases.
pub fn format_listing(selected: &[Selected<'_>], json: bool) -> Result<String> {
    let cases: Vec<ListedCase<'_>> = selected.iter().map(listed).collect();
    if json {
        return serde_json::to_string_pretty(&cases).context("Failed to serialize case list");
    }
    let mut out = String::new();
    for c in &cases {
        let _ = write!(out, "{:<9} {}", c.kind.as_str(), c.identity);
        if !c.tags.is_empty() {
            let _ = write!(out, "  tags: {}", c.tags.join(","));
        }
        if !c.requirements.is_empty() {
            let _ = write!(out, "  requires: {}", c.requirements.join(","));
        }
        if let Some(fixture) = &c.fixture {
            let _ = write!(out, "  fixture: {}", fixture);
        }
        if c.skip {
            let _ = write!(out, "  [skip");
            if let Some(reason) = c.skip_reason.filter(|r| !r.is_empty()) {
                let _ = write!(out, ": {}", reason);
            }
            out.push(']');
        }
        if !c.missing_capabilities.is_empty() {
            let _ = write!(out, "  [missing: {}]", c.missing_capabilities.join(","));
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{} case(s)", cases.len());
    Ok(out)
}
