//! Identity and classification of registered cases.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shape::TemplateParamKind;
use crate::value::ArgValue;

/// Registry key: a case name is unique within its suite.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId {
    pub suite: String,
    pub name: String,
}

impl CaseId {
    pub fn new(suite: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
        }
    }

    /// Stable, address-independent identity string.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.suite, self.name)
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.suite, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    Test,
    Fuzz,
    Benchmark,
    Jitter,
    Baseline,
}

impl CaseKind {
    /// Kinds that record timing statistics.
    pub fn is_measured(&self) -> bool {
        matches!(
            self,
            CaseKind::Benchmark | CaseKind::Jitter | CaseKind::Baseline
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseKind::Test => "test",
            CaseKind::Fuzz => "fuzz",
            CaseKind::Benchmark => "bench",
            CaseKind::Jitter => "jitter",
            CaseKind::Baseline => "baseline",
        }
    }
}

impl fmt::Display for CaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureLifetime {
    #[default]
    None,
    PerCase,
    PerSuite,
}

impl fmt::Display for FixtureLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureLifetime::None => write!(f, "none"),
            FixtureLifetime::PerCase => write!(f, "case"),
            FixtureLifetime::PerSuite => write!(f, "suite"),
        }
    }
}

/// Name of a fixture factory registered alongside the cases.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixtureRef {
    pub name: String,
}

impl FixtureRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for FixtureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One explicit template instantiation argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBinding {
    pub param: String,
    pub kind: TemplateParamKind,
    pub arg: String,
}

/// Enumerated values for one parameter of a data-driven test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub param: String,
    /// Position of the parameter in the declaration.
    pub index: usize,
    pub values: Vec<ArgValue>,
}
