//! Metadata model: the closed set of annotation tags and their argument shapes.
//!
//! [`classify`] only decides what is legal for a single annotation. Reporting
//! violations with source locations, and every cross-annotation rule, is the
//! validator's job.

use std::fmt;
use std::time::Duration;

use casefile_types::{Annotation, AnnotationArg, CaseKind, FixtureLifetime};

/// Default histogram bucket count for jitter cases.
pub const DEFAULT_JITTER_BINS: usize = 10;

/// Recognized annotation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Test,
    Fuzz,
    Bench,
    Jitter,
    Baseline,
    Suite,
    Tags,
    Owner,
    Group,
    Requires,
    Skip,
    Fixture,
    Template,
    Parameters,
    Domains,
    Seed,
    Timeout,
}

impl Tag {
    /// Tag lookup, case-insensitive, aliases included.
    pub fn parse(name: &str) -> Option<Tag> {
        let lower = name.trim().to_ascii_lowercase();
        RULES
            .iter()
            .find(|rule| rule.names.contains(&lower.as_str()))
            .map(|rule| rule.tag)
    }

    pub fn name(&self) -> &'static str {
        self.rule().names[0]
    }

    pub fn is_repeatable(&self) -> bool {
        self.rule().repeatable
    }

    pub fn case_kind(&self) -> Option<CaseKind> {
        match self {
            Tag::Test => Some(CaseKind::Test),
            Tag::Fuzz => Some(CaseKind::Fuzz),
            Tag::Bench => Some(CaseKind::Benchmark),
            Tag::Jitter => Some(CaseKind::Jitter),
            Tag::Baseline => Some(CaseKind::Baseline),
            _ => None,
        }
    }

    pub fn rule(&self) -> &'static TagRule {
        &RULES[*self as usize]
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of positional arguments a tag accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(1) => write!(f, "exactly 1 argument"),
            Arity::Exactly(k) => write!(f, "exactly {} arguments", k),
            Arity::AtLeast(1) => write!(f, "at least 1 argument"),
            Arity::AtLeast(k) => write!(f, "at least {} arguments", k),
            Arity::Any => write!(f, "any number of arguments"),
        }
    }
}

/// A named argument a tag understands.
#[derive(Debug, Clone, Copy)]
pub struct NamedArg {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
}

#[derive(Debug)]
pub struct TagRule {
    pub tag: Tag,
    /// Canonical spelling first, then aliases.
    pub names: &'static [&'static str],
    pub positional: Arity,
    pub named: &'static [NamedArg],
    pub repeatable: bool,
}

impl TagRule {
    pub fn named_arg(&self, name: &str) -> Option<&NamedArg> {
        self.named.iter().find(|n| n.name == name)
    }
}

const NO_NAMED: &[NamedArg] = &[];

/// One row per [`Tag`], in declaration order.
pub const RULES: &[TagRule] = &[
    TagRule {
        tag: Tag::Test,
        names: &["test"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Fuzz,
        names: &["fuzz"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Bench,
        names: &["bench", "benchmark"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Jitter,
        names: &["jitter"],
        positional: Arity::Exactly(1),
        named: &[NamedArg {
            name: "bins",
            required: false,
            default: Some("10"),
        }],
        repeatable: false,
    },
    TagRule {
        tag: Tag::Baseline,
        names: &["baseline"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Suite,
        names: &["suite"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Tags,
        names: &["tags"],
        positional: Arity::AtLeast(1),
        named: NO_NAMED,
        repeatable: true,
    },
    TagRule {
        tag: Tag::Owner,
        names: &["owner"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Group,
        names: &["group"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Requires,
        names: &["requires", "req"],
        positional: Arity::AtLeast(1),
        named: NO_NAMED,
        repeatable: true,
    },
    TagRule {
        tag: Tag::Skip,
        names: &["skip"],
        positional: Arity::Any,
        named: &[NamedArg {
            name: "reason",
            required: false,
            default: None,
        }],
        repeatable: false,
    },
    TagRule {
        tag: Tag::Fixture,
        names: &["fixture"],
        positional: Arity::Exactly(1),
        named: &[NamedArg {
            name: "lifetime",
            required: false,
            default: Some("case"),
        }],
        repeatable: false,
    },
    TagRule {
        tag: Tag::Template,
        names: &["template"],
        positional: Arity::Exactly(2),
        named: NO_NAMED,
        repeatable: true,
    },
    TagRule {
        tag: Tag::Parameters,
        names: &["parameters"],
        positional: Arity::AtLeast(2),
        named: NO_NAMED,
        repeatable: true,
    },
    TagRule {
        tag: Tag::Domains,
        names: &["domains"],
        positional: Arity::AtLeast(1),
        named: NO_NAMED,
        repeatable: false,
    },
    TagRule {
        tag: Tag::Seed,
        names: &["seed"],
        positional: Arity::AtLeast(1),
        named: NO_NAMED,
        repeatable: true,
    },
    TagRule {
        tag: Tag::Timeout,
        names: &["timeout"],
        positional: Arity::Exactly(1),
        named: NO_NAMED,
        repeatable: false,
    },
];

// A missing or misplaced row is a build error, not a wrong rule at runtime.
const _: () = {
    assert!(RULES.len() == Tag::Timeout as usize + 1);
    let mut i = 0;
    while i < RULES.len() {
        assert!(RULES[i].tag as usize == i);
        i += 1;
    }
};

/// An annotation whose arguments have been checked against its tag rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedAnnotation {
    Kind {
        kind: CaseKind,
        name: String,
        /// Histogram buckets, jitter only.
        bins: Option<usize>,
    },
    Suite(String),
    Tags(Vec<String>),
    Owner(String),
    Group(String),
    Requires(Vec<String>),
    Skip {
        reason: String,
    },
    Fixture {
        name: String,
        lifetime: FixtureLifetime,
    },
    Template {
        param: String,
        arg: String,
    },
    Parameters {
        param: String,
        values: Vec<String>,
    },
    /// Raw domain descriptors, parsed by the validator against parameter types.
    Domains(Vec<String>),
    /// Raw literal tokens of one seed tuple.
    Seed(Vec<String>),
    Timeout(Duration),
}

impl ClassifiedAnnotation {
    pub fn tag(&self) -> Tag {
        match self {
            ClassifiedAnnotation::Kind { kind, .. } => match kind {
                CaseKind::Test => Tag::Test,
                CaseKind::Fuzz => Tag::Fuzz,
                CaseKind::Benchmark => Tag::Bench,
                CaseKind::Jitter => Tag::Jitter,
                CaseKind::Baseline => Tag::Baseline,
            },
            ClassifiedAnnotation::Suite(_) => Tag::Suite,
            ClassifiedAnnotation::Tags(_) => Tag::Tags,
            ClassifiedAnnotation::Owner(_) => Tag::Owner,
            ClassifiedAnnotation::Group(_) => Tag::Group,
            ClassifiedAnnotation::Requires(_) => Tag::Requires,
            ClassifiedAnnotation::Skip { .. } => Tag::Skip,
            ClassifiedAnnotation::Fixture { .. } => Tag::Fixture,
            ClassifiedAnnotation::Template { .. } => Tag::Template,
            ClassifiedAnnotation::Parameters { .. } => Tag::Parameters,
            ClassifiedAnnotation::Domains(_) => Tag::Domains,
            ClassifiedAnnotation::Seed(_) => Tag::Seed,
            ClassifiedAnnotation::Timeout(_) => Tag::Timeout,
        }
    }
}

/// Why an annotation is not legal on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownTag {
        tag: String,
    },
    UnknownArgument {
        tag: String,
        argument: String,
    },
    Arity {
        tag: String,
        expected: Arity,
        got: usize,
    },
    InvalidValue {
        tag: String,
        argument: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownTag { tag } => write!(f, "unknown annotation `{}`", tag),
            ModelError::UnknownArgument { tag, argument } => {
                write!(f, "`{}` has no argument named `{}`", tag, argument)
            }
            ModelError::Arity { tag, expected, got } => {
                write!(f, "`{}` takes {}, got {}", tag, expected, got)
            }
            ModelError::InvalidValue {
                tag,
                argument,
                value,
                reason,
            } => write!(
                f,
                "invalid value \"{}\" for `{}` argument `{}`: {}",
                value, tag, argument, reason
            ),
        }
    }
}

impl std::error::Error for ModelError {}

/// Classify one annotation against the tag table.
pub fn classify(annotation: &Annotation) -> Result<ClassifiedAnnotation, ModelError> {
    classify_tag(&annotation.tag, &annotation.args)
}

pub fn classify_tag(tag: &str, args: &[AnnotationArg]) -> Result<ClassifiedAnnotation, ModelError> {
    let parsed = Tag::parse(tag).ok_or_else(|| ModelError::UnknownTag {
        tag: tag.to_string(),
    })?;
    let rule = parsed.rule();
    let tag_name = rule.names[0];

    for arg in args.iter() {
        if let Some(name) = &arg.name {
            if rule.named_arg(name).is_none() {
                return Err(ModelError::UnknownArgument {
                    tag: tag_name.to_string(),
                    argument: name.clone(),
                });
            }
        }
    }
    for named in rule.named.iter().filter(|n| n.required) {
        if named_value(args, named.name).is_none() {
            return Err(ModelError::InvalidValue {
                tag: tag_name.to_string(),
                argument: named.name.to_string(),
                value: String::new(),
                reason: "required argument is missing".to_string(),
            });
        }
    }

    let positional: Vec<String> = args
        .iter()
        .filter(|a| !a.is_named())
        .map(|a| a.value.clone())
        .collect();
    if !rule.positional.accepts(positional.len()) {
        return Err(ModelError::Arity {
            tag: tag_name.to_string(),
            expected: rule.positional,
            got: positional.len(),
        });
    }

    let invalid = |argument: &str, value: &str, reason: &str| ModelError::InvalidValue {
        tag: tag_name.to_string(),
        argument: argument.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let non_empty = |idx: usize, argument: &str| -> Result<String, ModelError> {
        let value = positional[idx].trim();
        if value.is_empty() {
            Err(invalid(argument, value, "must not be empty"))
        } else {
            Ok(value.to_string())
        }
    };
    let with_default = |name: &str| -> Option<String> {
        named_value(args, name).or_else(|| {
            rule.named_arg(name)
                .and_then(|n| n.default)
                .map(str::to_string)
        })
    };

    let classified = match parsed {
        Tag::Test | Tag::Fuzz | Tag::Bench | Tag::Jitter | Tag::Baseline => {
            let name = non_empty(0, "name")?;
            let bins = if parsed == Tag::Jitter {
                let raw = with_default("bins").unwrap_or_else(|| DEFAULT_JITTER_BINS.to_string());
                match raw.trim().parse::<usize>() {
                    Ok(b) if b > 0 => Some(b),
                    _ => return Err(invalid("bins", &raw, "expected a positive integer")),
                }
            } else {
                None
            };
            ClassifiedAnnotation::Kind {
                kind: parsed.case_kind().unwrap_or(CaseKind::Test),
                name,
                bins,
            }
        }
        Tag::Suite => ClassifiedAnnotation::Suite(non_empty(0, "name")?),
        Tag::Owner => ClassifiedAnnotation::Owner(non_empty(0, "owner")?),
        Tag::Group => ClassifiedAnnotation::Group(non_empty(0, "group")?),
        Tag::Tags => {
            let mut tags = Vec::with_capacity(positional.len());
            for idx in 0..positional.len() {
                tags.push(non_empty(idx, "tag")?);
            }
            ClassifiedAnnotation::Tags(tags)
        }
        Tag::Requires => {
            let mut reqs = Vec::with_capacity(positional.len());
            for idx in 0..positional.len() {
                reqs.push(non_empty(idx, "capability")?);
            }
            ClassifiedAnnotation::Requires(reqs)
        }
        Tag::Skip => {
            let mut parts = positional.clone();
            if let Some(reason) = named_value(args, "reason") {
                parts.push(reason);
            }
            ClassifiedAnnotation::Skip {
                reason: parts.join(", "),
            }
        }
        Tag::Fixture => {
            let name = non_empty(0, "name")?;
            let raw = with_default("lifetime").unwrap_or_else(|| "case".to_string());
            let lifetime = parse_lifetime(&raw)
                .ok_or_else(|| invalid("lifetime", &raw, "expected `case` or `suite`"))?;
            ClassifiedAnnotation::Fixture { name, lifetime }
        }
        Tag::Template => ClassifiedAnnotation::Template {
            param: non_empty(0, "param")?,
            arg: non_empty(1, "arg")?,
        },
        Tag::Parameters => ClassifiedAnnotation::Parameters {
            param: non_empty(0, "param")?,
            values: positional[1..].to_vec(),
        },
        Tag::Domains => {
            let mut domains = Vec::with_capacity(positional.len());
            for idx in 0..positional.len() {
                domains.push(non_empty(idx, "domain")?);
            }
            ClassifiedAnnotation::Domains(domains)
        }
        Tag::Seed => ClassifiedAnnotation::Seed(positional.clone()),
        Tag::Timeout => {
            let raw = positional[0].trim();
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => ClassifiedAnnotation::Timeout(Duration::from_millis(ms)),
                _ => return Err(invalid("ms", raw, "expected a positive number of milliseconds")),
            }
        }
    };
    Ok(classified)
}

fn named_value(args: &[AnnotationArg], name: &str) -> Option<String> {
    args.iter()
        .find(|a| a.name.as_deref() == Some(name))
        .map(|a| a.value.clone())
}

fn parse_lifetime(raw: &str) -> Option<FixtureLifetime> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "case" | "per_case" | "test" => Some(FixtureLifetime::PerCase),
        "suite" | "per_suite" => Some(FixtureLifetime::PerSuite),
        _ => None,
    }
}
