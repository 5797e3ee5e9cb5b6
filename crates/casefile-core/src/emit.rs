//! Registration emitter and its two entry adapters.
//!
//! [`emit`] only copies validated fields. [`UnitBuilder`] (wrapper style)
//! and [`register_module`] (module style, a static entry table) are two
//! front doors to the same contract and produce identical records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use casefile_types::{
    CaseId, CaseKind, Declaration, FixtureLifetime, FixtureRef, SourceLocation,
};

use crate::case::CaseSpec;
use crate::fixture::{Fixture, FixtureRegistration};
use crate::invoke::{Case, Invoker};
use crate::validate::{validate_declaration, ValidationError};

/// What the aggregator consumes: one per case, independent of which unit
/// or adapter produced it.
#[derive(Debug, Clone)]
pub struct RegistrationRecord {
    /// Registration unit that contributed the record.
    pub unit: String,
    pub case: CaseSpec,
    pub invoke: Invoker,
}

impl RegistrationRecord {
    pub fn id(&self) -> &CaseId {
        &self.case.id
    }

    pub fn location(&self) -> &SourceLocation {
        &self.case.location
    }

    pub fn descriptor(&self) -> RecordDescriptor {
        RecordDescriptor::from_spec(&self.unit, &self.case)
    }
}

/// Serializable view of a record: every field except the callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    /// `suite/name`, stable across builds.
    pub identity: String,
    pub name: String,
    pub suite: String,
    pub unit: String,
    pub file: String,
    pub line: u32,
    pub kind: CaseKind,
    pub tags: BTreeSet<String>,
    pub requirements: BTreeSet<String>,
    pub should_skip: bool,
    pub skip_reason: Option<String>,
    pub fixture: Option<FixtureRef>,
    pub fixture_lifetime: FixtureLifetime,
    /// Full validated metadata (fuzz inputs, parameters, template bindings).
    pub spec: CaseSpec,
}

impl RecordDescriptor {
    pub fn from_spec(unit: &str, spec: &CaseSpec) -> Self {
        Self {
            identity: spec.id.qualified(),
            name: spec.id.name.clone(),
            suite: spec.id.suite.clone(),
            unit: unit.to_string(),
            file: spec.location.file.clone(),
            line: spec.location.line,
            kind: spec.kind,
            tags: spec.tags.clone(),
            requirements: spec.requirements.clone(),
            should_skip: spec.should_skip,
            skip_reason: spec.skip_reason.clone(),
            fixture: spec.fixture.clone(),
            fixture_lifetime: spec.fixture_lifetime,
            spec: spec.clone(),
        }
    }
}

/// Turn a bound case into its registration record.
pub fn emit(unit: &str, case: &Case) -> RegistrationRecord {
    RegistrationRecord {
        unit: unit.to_string(),
        case: case.spec.clone(),
        invoke: case.invoke.clone(),
    }
}

/// A declaration that failed validation or binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDiagnostic {
    pub unit: String,
    pub location: SourceLocation,
    pub symbol: String,
    /// Rule name, e.g. `MemberFuzzTargetError` or `SignatureMismatch`.
    pub rule: String,
    pub message: String,
}

impl UnitDiagnostic {
    fn from_validation(unit: &str, err: &ValidationError) -> Self {
        Self {
            unit: unit.to_string(),
            location: err.location.clone(),
            symbol: err.symbol.clone(),
            rule: err.kind.rule_name().to_string(),
            message: err.message.clone(),
        }
    }
}

impl std::fmt::Display for UnitDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: error[{}]: {}", self.location, self.rule, self.message)
    }
}

/// Everything one unit contributes to the registry.
#[derive(Debug, Clone, Default)]
pub struct UnitRecords {
    pub unit: String,
    pub records: Vec<RegistrationRecord>,
    pub fixtures: Vec<FixtureRegistration>,
    pub diagnostics: Vec<UnitDiagnostic>,
}

impl UnitRecords {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Validate, bind and emit one declaration into `out`.
fn register_one(out: &mut UnitRecords, declaration: &Declaration, invoke: Invoker) {
    let spec = match validate_declaration(declaration) {
        Ok(spec) => spec,
        Err(err) => {
            out.diagnostics
                .push(UnitDiagnostic::from_validation(&out.unit, &err));
            return;
        }
    };
    match spec.bind(invoke) {
        Ok(case) => {
            debug!(unit = %out.unit, case = %case.spec.id, "case registered");
            let record = emit(&out.unit, &case);
            out.records.push(record);
        }
        Err(err) => out.diagnostics.push(UnitDiagnostic {
            unit: out.unit.clone(),
            location: declaration.shape.location.clone(),
            symbol: declaration.shape.symbol.clone(),
            rule: "SignatureMismatch".to_string(),
            message: err.to_string(),
        }),
    }
}

/// Wrapper-style adapter: chain one call per case.
///
/// ```ignore
/// let unit = UnitBuilder::new("tests/math")
///     .case(decl, Invoker::no_arg(|ctx| ctx.require(1 + 1 == 2, "sum")))
///     .build();
/// ```
pub struct UnitBuilder {
    out: UnitRecords,
}

impl UnitBuilder {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            out: UnitRecords {
                unit: unit.into(),
                ..Default::default()
            },
        }
    }

    pub fn case(mut self, declaration: Declaration, invoke: Invoker) -> Self {
        register_one(&mut self.out, &declaration, invoke);
        self
    }

    pub fn fixture<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Fixture> + Send + Sync + 'static,
    {
        self.out.fixtures.push(FixtureRegistration::new(name, factory));
        self
    }

    pub fn build(self) -> UnitRecords {
        self.out
    }
}

/// One row of a module-style registration table.
pub struct ModuleEntry {
    pub declaration: Declaration,
    pub invoke: Invoker,
}

impl ModuleEntry {
    pub fn new(declaration: Declaration, invoke: Invoker) -> Self {
        Self {
            declaration,
            invoke,
        }
    }
}

/// Module-style adapter: register a whole entry table at once.
pub fn register_module(
    unit: impl Into<String>,
    entries: Vec<ModuleEntry>,
    fixtures: Vec<FixtureRegistration>,
) -> UnitRecords {
    let mut out = UnitRecords {
        unit: unit.into(),
        fixtures,
        ..Default::default()
    };
    for entry in entries {
        register_one(&mut out, &entry.declaration, entry.invoke);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use casefile_types::{Annotation, DeclarationShape};

    fn decl(name: &str, line: u32) -> Declaration {
        Declaration::new(DeclarationShape::free_fn(
            format!("fn_{}", name),
            SourceLocation::new("unit.cpp", line),
        ))
        .annotate(Annotation::new("test").arg(name))
        .annotate(Annotation::new("tags").args(["fast", "math"]))
    }

    #[test]
    fn test_adapters_produce_identical_records() {
        let wrapper = UnitBuilder::new("u")
            .case(decl("a", 1), Invoker::no_arg(|_| Ok(())))
            .case(decl("b", 2), Invoker::no_arg(|_| Ok(())))
            .build();
        let module = register_module(
            "u",
            vec![
                ModuleEntry::new(decl("a", 1), Invoker::no_arg(|_| Ok(()))),
                ModuleEntry::new(decl("b", 2), Invoker::no_arg(|_| Ok(()))),
            ],
            Vec::new(),
        );
        let lhs: Vec<RecordDescriptor> = wrapper.records.iter().map(|r| r.descriptor()).collect();
        let rhs: Vec<RecordDescriptor> = module.records.iter().map(|r| r.descriptor()).collect();
        assert_eq!(lhs, rhs);
        assert_eq!(lhs[0].identity, "default/a");
    }

    #[test]
    fn test_invalid_declaration_becomes_diagnostic() {
        let bad = Declaration::new(
            DeclarationShape::free_fn("f", SourceLocation::new("unit.cpp", 9)).member(),
        )
        .annotate(Annotation::new("fuzz").arg("x"));
        let unit = UnitBuilder::new("u")
            .case(bad, Invoker::bytes(|_, _| Ok(())))
            .build();
        assert!(unit.records.is_empty());
        assert_eq!(unit.diagnostics.len(), 1);
        assert_eq!(unit.diagnostics[0].rule, "MemberFuzzTargetError");
        assert!(!unit.is_valid());
    }

    #[test]
    fn test_signature_mismatch_becomes_diagnostic() {
        let unit = UnitBuilder::new("u")
            .case(decl("a", 1), Invoker::bytes(|_, _| Ok(())))
            .build();
        assert_eq!(unit.diagnostics[0].rule, "SignatureMismatch");
    }

    #[test]
    fn test_descriptor_json_has_no_callable() {
        let unit = UnitBuilder::new("u")
            .case(decl("a", 1), Invoker::no_arg(|_| Ok(())))
            .build();
        let json = serde_json::to_value(unit.records[0].descriptor()).unwrap();
        assert_eq!(json["identity"], "default/a");
        assert_eq!(json["file"], "unit.cpp");
        assert_eq!(json["tags"], serde_json::json!(["fast", "math"]));
    }
}
