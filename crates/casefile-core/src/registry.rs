//! Registry aggregation.
//!
//! Units register independently; [`Registry::aggregate`] merges them in one
//! step and either returns a complete registry or an error. A partial
//! registry is never handed out.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use casefile_types::{CaseId, SourceLocation};

use crate::emit::{RegistrationRecord, UnitDiagnostic, UnitRecords};
use crate::fixture::FixtureTable;

/// Where one side of a collision came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub unit: String,
    pub location: SourceLocation,
}

impl fmt::Display for Contribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (unit {})", self.location, self.unit)
    }
}

/// Two records claiming the same `(suite, name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub id: CaseId,
    pub first: Contribution,
    pub second: Contribution,
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate case `{}`: first registered at {}, again at {}",
            self.id, self.first, self.second
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Some unit carried validation diagnostics.
    Invalid(Vec<UnitDiagnostic>),
    DuplicateName(Vec<Collision>),
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationError::Invalid(diags) => {
                write!(f, "{} declaration(s) failed validation", diags.len())?;
                for d in diags {
                    write!(f, "\n  {}", d)?;
                }
                Ok(())
            }
            AggregationError::DuplicateName(collisions) => {
                write!(f, "{} duplicate case name(s)", collisions.len())?;
                for c in collisions {
                    write!(f, "\n  {}", c)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregationError {}

/// Find every `(suite, name)` claimed more than once. Each extra claim is
/// reported against the first one. Result is sorted by case id.
pub fn detect_collisions<'a, I>(entries: I) -> Vec<Collision>
where
    I: IntoIterator<Item = (&'a CaseId, Contribution)>,
{
    let mut first_seen: BTreeMap<&CaseId, Contribution> = BTreeMap::new();
    let mut collisions = Vec::new();
    for (id, contribution) in entries {
        match first_seen.get(id) {
            Some(first) => collisions.push(Collision {
                id: id.clone(),
                first: first.clone(),
                second: contribution,
            }),
            None => {
                first_seen.insert(id, contribution);
            }
        }
    }
    collisions.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| a.second.location.cmp(&b.second.location))
    });
    collisions
}

/// The merged, read-only set of registered cases.
#[derive(Default)]
pub struct Registry {
    cases: BTreeMap<CaseId, RegistrationRecord>,
    fixtures: FixtureTable,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("cases", &self.cases.keys().collect::<Vec<_>>())
            .field("fixtures", &self.fixtures.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn aggregate(units: Vec<UnitRecords>) -> Result<Registry, AggregationError> {
        let diagnostics: Vec<UnitDiagnostic> = units
            .iter()
            .flat_map(|u| u.diagnostics.iter().cloned())
            .collect();
        if !diagnostics.is_empty() {
            return Err(AggregationError::Invalid(diagnostics));
        }

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
        if !collisions.is_empty() {
            return Err(AggregationError::DuplicateName(collisions));
        }

        let mut registry = Registry::default();
        let unit_count = units.len();
        for unit in units {
            for fixture in unit.fixtures {
                if registry.fixtures.contains_key(&fixture.name) {
                    debug!(fixture = %fixture.name, unit = %unit.unit, "fixture already registered, keeping the first");
                    continue;
                }
                registry.fixtures.insert(fixture.name, fixture.factory);
            }
            for record in unit.records {
                registry.cases.insert(record.case.id.clone(), record);
            }
        }

        for record in registry.cases.values() {
            if let Some(fixture) = &record.case.fixture {
                if !registry.fixtures.contains_key(&fixture.name) {
                    warn!(case = %record.case.id, fixture = %fixture.name, "case uses an unregistered fixture");
                }
            }
        }
        info!(
            cases = registry.cases.len(),
            units = unit_count,
            fixtures = registry.fixtures.len(),
            "registry aggregated"
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, id: &CaseId) -> Option<&RegistrationRecord> {
        self.cases.get(id)
    }

    /// Cases in `(suite, name)` order.
    pub fn records(&self) -> impl Iterator<Item = &RegistrationRecord> {
        self.cases.values()
    }

    pub fn fixtures(&self) -> &FixtureTable {
        &self.fixtures
    }

    /// Resolve a bare name or a `suite/name` identity.
    pub fn lookup(&self, query: &str) -> Result<&RegistrationRecord, LookupError> {
        if let Some(record) = self.cases.values().find(|r| r.case.id.qualified() == query) {
            return Ok(record);
        }
        let matches: Vec<&RegistrationRecord> = self
            .cases
            .values()
            .filter(|r| r.case.id.name == query)
            .collect();
        match matches.as_slice() {
            [] => Err(LookupError::NotFound(query.to_string())),
            [one] => Ok(*one),
            many => Err(LookupError::Ambiguous {
                query: query.to_string(),
                candidates: many.iter().map(|r| r.case.id.qualified()).collect(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    NotFound(String),
    Ambiguous { query: String, candidates: Vec<String> },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound(q) => write!(f, "no case named `{}`", q),
            LookupError::Ambiguous { query, candidates } => write!(
                f,
                "`{}` is ambiguous: {}",
                query,
                candidates.join(", ")
            ),
        }
    }
}

impl std::error::Error for LookupError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::UnitBuilder;
    use crate::invoke::Invoker;
    use casefile_types::{Annotation, Declaration, DeclarationShape};

    fn unit(name: &str, cases: &[(&str, &str)]) -> UnitRecords {
        let mut builder = UnitBuilder::new(name);
        for (i, (suite, case)) in cases.iter().enumerate() {
            let decl = Declaration::new(DeclarationShape::free_fn(
                format!("{}_{}", suite, case),
                SourceLocation::new(format!("{}.cpp", name), i as u32 + 1),
            ))
            .annotate(Annotation::new("test").arg(*case))
            .annotate(Annotation::new("suite").arg(*suite));
            builder = builder.case(decl, Invoker::no_arg(|_| Ok(())));
        }
        builder.build()
    }

    #[test]
    fn test_lookup() {
        let reg = Registry::aggregate(vec![unit("a", &[("s1", "x"), ("s2", "x"), ("s1", "y")])]).unwrap();
        assert_eq!(reg.lookup("s2/x").unwrap().case.id, CaseId::new("s2", "x"));
        assert_eq!(reg.lookup("y").unwrap().case.id, CaseId::new("s1", "y"));
        assert!(matches!(reg.lookup("x"), Err(LookupError::Ambiguous { .. })));
        assert!(matches!(reg.lookup("z"), Err(LookupError::NotFound(_))));
    }

    #[test]
    fn test_collision_reports_both_sides() {
        let err = Registry::aggregate(vec![unit("a", &[("s", "x")]), unit("b", &[("s", "x")])]).unwrap_err();
        match err {
            AggregationError::DuplicateName(c) => {
                assert_eq!(c.len(), 1);
                assert_eq!(c[0].first.unit, "a");
                assert_eq!(c[0].second.unit, "b");
                assert!(c[0].to_string().contains("a.cpp:1"));
                assert!(c[0].to_string().contains("b.cpp:1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
