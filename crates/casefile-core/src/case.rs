//! Validated case metadata.
//!
//! A [`CaseSpec`] is everything the validator learned about one declaration.
//! It becomes a runnable [`Case`](crate::invoke::Case) once bound to an
//! invoker of the matching signature.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use casefile_types::{
    ArgValue, CaseId, CaseKind, FixtureLifetime, FixtureRef, ParamType, ParameterSet,
    SourceLocation, TemplateBinding,
};

use crate::domain::ResolvedDomain;

/// How one fuzz input is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// Raw fuzzer bytes. `len_param` is the index of the explicit size
    /// parameter when the buffer is a pointer + length pair.
    Buffer { len_param: Option<usize> },
    Domain {
        ty: ParamType,
        descriptor: String,
        domain: ResolvedDomain,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzInput {
    pub param_index: usize,
    pub name: String,
    pub source: InputSource,
}

impl FuzzInput {
    pub fn is_buffer(&self) -> bool {
        matches!(self.source, InputSource::Buffer { .. })
    }

    pub fn domain(&self) -> Option<&ResolvedDomain> {
        match &self.source {
            InputSource::Domain { domain, .. } => Some(domain),
            InputSource::Buffer { .. } => None,
        }
    }
}

/// Inputs and seed corpus of a fuzz target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzSpec {
    /// One entry per target input in parameter order; a pointer + length
    /// pair counts as a single buffer input.
    pub inputs: Vec<FuzzInput>,
    /// Literal seed tuples, one value per input.
    #[serde(default)]
    pub seeds: Vec<Vec<ArgValue>>,
}

impl FuzzSpec {
    /// A target whose only input is a single byte buffer.
    pub fn is_raw_bytes(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_buffer()
    }

    /// `(parameter index, descriptor)` for every non-buffer input.
    pub fn domains(&self) -> impl Iterator<Item = (usize, &str)> {
        self.inputs.iter().filter_map(|input| match &input.source {
            InputSource::Domain { descriptor, .. } => Some((input.param_index, descriptor.as_str())),
            InputSource::Buffer { .. } => None,
        })
    }
}

/// Callable shape a case body must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signature {
    NoArg,
    FixtureArg,
    Bytes,
    TypedArgs,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::NoArg => write!(f, "fn(&CaseContext)"),
            Signature::FixtureArg => write!(f, "fn(&CaseContext, &mut dyn Fixture)"),
            Signature::Bytes => write!(f, "fn(&CaseContext, &[u8])"),
            Signature::TypedArgs => write!(f, "fn(&CaseContext, &[ArgValue])"),
        }
    }
}

/// A validated declaration, minus its callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSpec {
    pub id: CaseId,
    pub kind: CaseKind,
    pub tags: BTreeSet<String>,
    pub requirements: BTreeSet<String>,
    pub should_skip: bool,
    pub skip_reason: Option<String>,
    pub fixture: Option<FixtureRef>,
    pub fixture_lifetime: FixtureLifetime,
    /// Declared symbol, for diagnostics.
    pub symbol: String,
    pub location: SourceLocation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_bindings: Vec<TemplateBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzz: Option<FuzzSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter_bins: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl CaseSpec {
    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn suite(&self) -> &str {
        &self.id.suite
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn expected_signature(&self) -> Signature {
        if let Some(fuzz) = &self.fuzz {
            if fuzz.is_raw_bytes() {
                Signature::Bytes
            } else {
                Signature::TypedArgs
            }
        } else if !self.parameters.is_empty() {
            Signature::TypedArgs
        } else if self.fixture.is_some() {
            Signature::FixtureArg
        } else {
            Signature::NoArg
        }
    }

    /// Every argument row of a data-driven case, the cartesian product of
    /// its value sets in parameter order. A case without parameter sets
    /// has a single empty row.
    pub fn parameter_rows(&self) -> Vec<Vec<ArgValue>> {
        let mut sets: Vec<&ParameterSet> = self.parameters.iter().collect();
        sets.sort_by_key(|set| set.index);
        let mut rows: Vec<Vec<ArgValue>> = vec![Vec::new()];
        for set in sets {
            let mut next = Vec::with_capacity(rows.len() * set.values.len());
            for row in &rows {
                for value in &set.values {
                    let mut extended = row.clone();
                    extended.push(value.clone());
                    next.push(extended);
                }
            }
            rows = next;
        }
        rows
    }

    /// Whether every requirement is among `capabilities`.
    pub fn requirements_met(&self, capabilities: &BTreeSet<String>) -> bool {
        self.requirements.is_subset(capabilities)
    }

    /// Requirements missing from `capabilities`, sorted.
    pub fn missing_requirements(&self, capabilities: &BTreeSet<String>) -> Vec<String> {
        self.requirements.difference(capabilities).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> CaseSpec {
        CaseSpec {
            id: CaseId::new("default", "t"),
            kind: CaseKind::Test,
            tags: BTreeSet::new(),
            requirements: BTreeSet::new(),
            should_skip: false,
            skip_reason: None,
            fixture: None,
            fixture_lifetime: FixtureLifetime::None,
            symbol: "t".into(),
            location: SourceLocation::new("t.cpp", 1),
            template_bindings: Vec::new(),
            parameters: Vec::new(),
            fuzz: None,
            jitter_bins: None,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_parameter_rows_cartesian_in_param_order() {
        let mut s = spec();
        s.parameters = vec![
            ParameterSet {
                param: "b".into(),
                index: 1,
                values: vec![ArgValue::Str("x".into()), ArgValue::Str("y".into())],
            },
            ParameterSet {
                param: "a".into(),
                index: 0,
                values: vec![ArgValue::Int(1), ArgValue::Int(2)],
            },
        ];
        let rows = s.parameter_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![ArgValue::Int(1), ArgValue::Str("x".into())]);
        assert_eq!(rows[3], vec![ArgValue::Int(2), ArgValue::Str("y".into())]);
        assert_eq!(s.expected_signature(), Signature::TypedArgs);
    }

    #[test]
    fn test_signature_defaults() {
        let mut s = spec();
        assert_eq!(s.parameter_rows(), vec![Vec::<ArgValue>::new()]);
        assert_eq!(s.expected_signature(), Signature::NoArg);
        s.fixture = Some(FixtureRef::new("db"));
        assert_eq!(s.expected_signature(), Signature::FixtureArg);
    }

    #[test]
    fn test_requirements() {
        let mut s = spec();
        s.requirements = ["gpu".to_string(), "net".to_string()].into_iter().collect();
        let caps: BTreeSet<String> = ["net".to_string()].into_iter().collect();
        assert!(!s.requirements_met(&caps));
        assert_eq!(s.missing_requirements(&caps), vec!["gpu".to_string()]);
    }
}
