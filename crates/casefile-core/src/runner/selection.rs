//! Case selection: which registered cases a run looks at.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use casefile_types::CaseKind;

use crate::emit::RegistrationRecord;
use crate::registry::{LookupError, Registry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFilter {
    #[default]
    All,
    Test,
    Fuzz,
    Bench,
    Jitter,
    Baseline,
}

impl KindFilter {
    pub fn matches(&self, kind: CaseKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Test => kind == CaseKind::Test,
            KindFilter::Fuzz => kind == CaseKind::Fuzz,
            KindFilter::Bench => kind == CaseKind::Benchmark,
            KindFilter::Jitter => kind == CaseKind::Jitter,
            KindFilter::Baseline => kind == CaseKind::Baseline,
        }
    }
}

impl FromStr for KindFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(KindFilter::All),
            "test" => Ok(KindFilter::Test),
            "fuzz" => Ok(KindFilter::Fuzz),
            "bench" | "benchmark" => Ok(KindFilter::Bench),
            "jitter" => Ok(KindFilter::Jitter),
            "baseline" => Ok(KindFilter::Baseline),
            other => Err(format!(
                "unknown kind `{}` (expected all, test, fuzz, bench, jitter or baseline)",
                other
            )),
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KindFilter::All => "all",
            KindFilter::Test => "test",
            KindFilter::Fuzz => "fuzz",
            KindFilter::Bench => "bench",
            KindFilter::Jitter => "jitter",
            KindFilter::Baseline => "baseline",
        };
        write!(f, "{}", s)
    }
}

/// Selection criteria. Empty lists mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub suites: Vec<String>,
    /// Every listed tag must be present (case-insensitive).
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    /// Glob with `*` and `?` over `suite/name`; text without wildcards is a
    /// substring match.
    pub filter: Option<String>,
    /// Exact `suite/name` or a unique bare name.
    pub run: Option<String>,
    pub kind: KindFilter,
    /// Capabilities the environment provides.
    pub capabilities: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    Lookup(LookupError),
    /// `--run` named a case whose kind the kind filter excludes.
    KindMismatch { case: String, kind: KindFilter },
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::Lookup(e) => write!(f, "{}", e),
            SelectionError::KindMismatch { case, kind } => {
                write!(f, "case `{}` is not of kind `{}`", case, kind)
            }
        }
    }
}

impl std::error::Error for SelectionError {}

impl From<LookupError> for SelectionError {
    fn from(e: LookupError) -> Self {
        SelectionError::Lookup(e)
    }
}

/// A case picked by a selection.
#[derive(Debug, Clone)]
pub struct Selected<'r> {
    pub record: &'r RegistrationRecord,
    /// Requirements the environment lacks; such a case is reported NotRun.
    pub missing: Vec<String>,
}

impl Selected<'_> {
    pub fn runnable(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Apply `selection` to the registry, in registry order.
pub fn select<'r>(
    registry: &'r Registry,
    selection: &Selection,
) -> Result<Vec<Selected<'r>>, SelectionError> {
    let candidates: Vec<&RegistrationRecord> = match &selection.run {
        Some(query) => {
            let record = registry.lookup(query)?;
            if !selection.kind.matches(record.case.kind) {
                return Err(SelectionError::KindMismatch {
                    case: record.case.id.qualified(),
                    kind: selection.kind,
                });
            }
            vec![record]
        }
        None => registry
            .records()
            .filter(|r| selection.kind.matches(r.case.kind))
            .filter(|r| {
                selection
                    .filter
                    .as_deref()
                    .map_or(true, |p| filter_matches(&r.case.id.qualified(), p))
            })
            .collect(),
    };

    let selected: Vec<Selected<'r>> = candidates
        .into_iter()
        .filter(|r| selection.suites.is_empty() || selection.suites.iter().any(|s| s == r.case.suite()))
        .filter(|r| selection.tags.iter().all(|t| has_tag(r, t)))
        .filter(|r| !selection.exclude_tags.iter().any(|t| has_tag(r, t)))
        .map(|record| Selected {
            record,
            missing: record.case.missing_requirements(&selection.capabilities),
        })
        .collect();
    debug!(
        selected = selected.len(),
        registered = registry.len(),
        "selection applied"
    );
    Ok(selected)
}

fn has_tag(record: &RegistrationRecord, tag: &str) -> bool {
    record.case.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

fn filter_matches(text: &str, pattern: &str) -> bool {
    if pattern.contains(['*', '?']) {
        wildcard_match(text, pattern)
    } else {
        text.contains(pattern)
    }
}

/// `*` matches any run of characters, `?` exactly one.
pub fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;
    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star = Some(pi);
            pi += 1;
            mark = ti;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::UnitBuilder;
    use crate::invoke::Invoker;
    use casefile_types::{Annotation, Declaration, DeclarationShape, SourceLocation};

    fn registry() -> Registry {
        let mk = |suite: &str, name: &str, kind: &str, tags: &[&str], req: &[&str]| {
            let mut d = Declaration::new(DeclarationShape::free_fn(
                name,
                SourceLocation::new("sel.cpp", 1),
            ))
            .annotate(Annotation::new(kind).arg(name))
            .annotate(Annotation::new("suite").arg(suite));
            if !tags.is_empty() {
                d = d.annotate(Annotation::new("tags").args(tags.iter().copied()));
            }
            if !req.is_empty() {
                d = d.annotate(Annotation::new("requires").args(req.iter().copied()));
            }
            d
        };
        let unit = UnitBuilder::new("sel")
            .case(mk("math", "add", "test", &["fast"], &[]), Invoker::no_arg(|_| Ok(())))
            .case(mk("math", "mul", "test", &["fast", "Slow"], &[]), Invoker::no_arg(|_| Ok(())))
            .case(mk("io", "read", "test", &[], &["network"]), Invoker::no_arg(|_| Ok(())))
            .case(mk("io", "hash", "bench", &[], &[]), Invoker::no_arg(|_| Ok(())))
            .build();
        Registry::aggregate(vec![unit]).unwrap()
    }

    fn names(sel: &[Selected<'_>]) -> Vec<String> {
        sel.iter().map(|s| s.record.case.id.qualified()).collect()
    }

    #[test]
    fn test_wildcard() {
        assert!(wildcard_match("math/add", "math/*"));
        assert!(wildcard_match("math/add", "*a?d"));
        assert!(!wildcard_match("math/add", "io/*"));
        assert!(wildcard_match("", "*"));
    }

    #[test]
    fn test_filters() {
        let reg = registry();
        let all = select(&reg, &Selection::default()).unwrap();
        assert_eq!(all.len(), 4);

        let sel = Selection {
            tags: vec!["fast".into(), "slow".into()],
            ..Default::default()
        };
        assert_eq!(names(&select(&reg, &sel).unwrap()), vec!["math/mul"]);

        let sel = Selection {
            exclude_tags: vec!["slow".into()],
            suites: vec!["math".into()],
            ..Default::default()
        };
        assert_eq!(names(&select(&reg, &sel).unwrap()), vec!["math/add"]);

        let sel = Selection {
            filter: Some("ad".into()),
            kind: KindFilter::Test,
            ..Default::default()
        };
        assert_eq!(
            names(&select(&reg, &sel).unwrap()),
            vec!["io/read", "math/add"]
        );
    }

    #[test]
    fn test_capabilities() {
        let reg = registry();
        let sel = Selection {
            run: Some("read".into()),
            ..Default::default()
        };
        let picked = select(&reg, &sel).unwrap();
        assert_eq!(picked[0].missing, vec!["network".to_string()]);
        assert!(!picked[0].runnable());

        let sel = Selection {
            run: Some("io/read".into()),
            capabilities: ["network".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(select(&reg, &sel).unwrap()[0].runnable());
    }

    #[test]
    fn test_run_errors() {
        let reg = registry();
        let sel = Selection {
            run: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(
            select(&reg, &sel),
            Err(SelectionError::Lookup(LookupError::NotFound(_)))
        ));
        let sel = Selection {
            run: Some("hash".into()),
            kind: KindFilter::Test,
            ..Default::default()
        };
        assert!(matches!(
            select(&reg, &sel),
            Err(SelectionError::KindMismatch { .. })
        ));
    }
}
