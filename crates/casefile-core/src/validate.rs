//! Declaration validator.
//!
//! Cross-checks a declaration's annotations against its static shape and
//! produces a [`CaseSpec`]. Every rule is local to one declaration; name
//! uniqueness is checked later, during aggregation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use casefile_types::{
    Annotation, ArgValue, CaseId, CaseKind, Declaration, DeclarationShape, FixtureLifetime,
    FixtureRef, ParamType, ParameterSet, SourceLocation, TemplateBinding, TemplateParamKind,
};

use crate::case::{CaseSpec, FuzzInput, FuzzSpec, InputSource};
use crate::domain::{arbitrary_for, parse_literal, resolve};
use crate::model::{classify, ClassifiedAnnotation, ModelError, Tag};

/// Suite used when neither `suite(..)` nor an enclosing scope is given.
pub const DEFAULT_SUITE: &str = "default";

/// Named failure modes of the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    MemberFuzzTarget,
    NonVoidReturn,
    RawPointerWithoutLength,
    UnsupportedParameterizedFuzz,
    UnknownTemplateParameter,
    InterleavedTemplateBindingOrder,
    UnknownAttributeArgument,
    UnknownAnnotation,
    InvalidArguments,
    DuplicateAnnotation,
    ConflictingKind,
    MissingKind,
    MissingTemplateBinding,
    DomainMismatch,
    InvalidSeed,
    UnfuzzableParameter,
    FuzzAnnotationOnNonFuzz,
    ParameterBinding,
}

impl ValidationErrorKind {
    pub fn rule_name(&self) -> &'static str {
        match self {
            ValidationErrorKind::MemberFuzzTarget => "MemberFuzzTargetError",
            ValidationErrorKind::NonVoidReturn => "NonVoidReturnError",
            ValidationErrorKind::RawPointerWithoutLength => "RawPointerWithoutLengthError",
            ValidationErrorKind::UnsupportedParameterizedFuzz => "UnsupportedParameterizedFuzzError",
            ValidationErrorKind::UnknownTemplateParameter => "UnknownTemplateParameterError",
            ValidationErrorKind::InterleavedTemplateBindingOrder => {
                "InterleavedTemplateBindingOrderError"
            }
            ValidationErrorKind::UnknownAttributeArgument => "UnknownAttributeArgumentError",
            ValidationErrorKind::UnknownAnnotation => "UnknownAnnotationError",
            ValidationErrorKind::InvalidArguments => "InvalidArgumentsError",
            ValidationErrorKind::DuplicateAnnotation => "DuplicateAnnotationError",
            ValidationErrorKind::ConflictingKind => "ConflictingKindError",
            ValidationErrorKind::MissingKind => "MissingKindError",
            ValidationErrorKind::MissingTemplateBinding => "MissingTemplateBindingError",
            ValidationErrorKind::DomainMismatch => "DomainMismatchError",
            ValidationErrorKind::InvalidSeed => "InvalidSeedError",
            ValidationErrorKind::UnfuzzableParameter => "UnfuzzableParameterError",
            ValidationErrorKind::FuzzAnnotationOnNonFuzz => "FuzzAnnotationOnNonFuzzError",
            ValidationErrorKind::ParameterBinding => "ParameterBindingError",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rule_name())
    }
}

/// A rejected declaration. It produces no case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub location: SourceLocation,
    pub symbol: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: error[{}]: {}",
            self.location,
            self.kind.rule_name(),
            self.message
        )
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_declaration(decl: &Declaration) -> Result<CaseSpec, ValidationError> {
    validate(&decl.annotations, &decl.shape)
}

/// Validate one declaration.
pub fn validate(
    annotations: &[Annotation],
    shape: &DeclarationShape,
) -> Result<CaseSpec, ValidationError> {
    Validator { shape }.run(annotations)
}

struct Validator<'a> {
    shape: &'a DeclarationShape,
}

/// Annotation values gathered before the shape checks.
#[derive(Default)]
struct Collected {
    kind: Option<(CaseKind, String, Option<usize>)>,
    suite: Option<String>,
    tags: BTreeSet<String>,
    requirements: BTreeSet<String>,
    skip: Option<String>,
    fixture: Option<(String, FixtureLifetime)>,
    templates: Vec<(String, String)>,
    parameters: Vec<(String, Vec<String>)>,
    domains: Option<Vec<String>>,
    seeds: Vec<Vec<String>>,
    timeout_ms: Option<u64>,
}

impl<'a> Validator<'a> {
    fn error(&self, kind: ValidationErrorKind, message: impl Into<String>) -> ValidationError {
        ValidationError {
            kind,
            location: self.shape.location.clone(),
            symbol: self.shape.symbol.clone(),
            message: message.into(),
        }
    }

    fn run(&self, annotations: &[Annotation]) -> Result<CaseSpec, ValidationError> {
        let collected = self.collect(annotations)?;
        let (kind, name, bins) = collected.kind.clone().ok_or_else(|| {
            self.error(
                ValidationErrorKind::MissingKind,
                format!(
                    "`{}` has no `test`, `fuzz`, `bench`, `jitter` or `baseline` annotation",
                    self.shape.symbol
                ),
            )
        })?;

        self.check_shape(kind, &collected)?;
        let fuzz = if kind == CaseKind::Fuzz {
            Some(self.fuzz_spec(&collected)?)
        } else {
            None
        };
        let template_bindings = self.template_bindings(&collected.templates)?;
        let parameters = self.parameter_sets(kind, &collected)?;

        let suite = collected
            .suite
            .clone()
            .or_else(|| self.shape.scope.clone().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_SUITE.to_string());
        // `suite/name` is the identity string; a second separator would
        // make it ambiguous.
        for (what, value) in [("case name", &name), ("suite", &suite)] {
            if value.contains('/') {
                return Err(self.error(
                    ValidationErrorKind::InvalidArguments,
                    format!("{} `{}` of `{}` must not contain `/`", what, value, self.shape.symbol),
                ));
            }
        }
        let (fixture, fixture_lifetime) = match &collected.fixture {
            Some((name, lifetime)) => (Some(FixtureRef::new(name.clone())), *lifetime),
            None => (None, FixtureLifetime::None),
        };

        Ok(CaseSpec {
            id: CaseId::new(suite, name),
            kind,
            tags: collected.tags,
            requirements: collected.requirements,
            should_skip: collected.skip.is_some(),
            skip_reason: collected.skip,
            fixture,
            fixture_lifetime,
            symbol: self.shape.symbol.clone(),
            location: self.shape.location.clone(),
            template_bindings,
            parameters,
            fuzz,
            jitter_bins: bins,
            timeout_ms: collected.timeout_ms,
        })
    }

    // ---- Annotation collection ----

    fn collect(&self, annotations: &[Annotation]) -> Result<Collected, ValidationError> {
        let mut out = Collected::default();
        let mut seen: HashSet<Tag> = HashSet::new();
        let mut kinds: Vec<(Tag, CaseKind, String, Option<usize>)> = Vec::new();

        for annotation in annotations {
            let classified = classify(annotation).map_err(|e| self.model_error(annotation, e))?;
            let tag = classified.tag();
            if tag.case_kind().is_none() && !tag.is_repeatable() && !seen.insert(tag) {
                return Err(self.error(
                    ValidationErrorKind::DuplicateAnnotation,
                    format!("`{}` may appear only once on `{}`", tag, self.shape.symbol),
                ));
            }
            match classified {
                ClassifiedAnnotation::Kind { kind, name, bins } => {
                    kinds.push((tag, kind, name, bins))
                }
                ClassifiedAnnotation::Suite(s) => out.suite = Some(s),
                ClassifiedAnnotation::Tags(tags) => out.tags.extend(tags),
                ClassifiedAnnotation::Owner(o) => {
                    out.tags.insert(format!("owner={}", o));
                }
                ClassifiedAnnotation::Group(g) => {
                    out.tags.insert(format!("group={}", g));
                }
                ClassifiedAnnotation::Requires(reqs) => out.requirements.extend(reqs),
                ClassifiedAnnotation::Skip { reason } => out.skip = Some(reason),
                ClassifiedAnnotation::Fixture { name, lifetime } => {
                    out.fixture = Some((name, lifetime))
                }
                ClassifiedAnnotation::Template { param, arg } => out.templates.push((param, arg)),
                ClassifiedAnnotation::Parameters { param, values } => {
                    out.parameters.push((param, values))
                }
                ClassifiedAnnotation::Domains(d) => out.domains = Some(d),
                ClassifiedAnnotation::Seed(s) => out.seeds.push(s),
                ClassifiedAnnotation::Timeout(t) => out.timeout_ms = Some(t.as_millis() as u64),
            }
        }

        if kinds.len() > 1 {
            let distinct: BTreeSet<Tag> = kinds.iter().map(|k| k.0).collect();
            if distinct.len() == 1 {
                return Err(self.error(
                    ValidationErrorKind::DuplicateAnnotation,
                    format!("`{}` may appear only once on `{}`", kinds[0].0, self.shape.symbol),
                ));
            }
            let names: Vec<&str> = distinct.iter().map(|t| t.name()).collect();
            return Err(self.error(
                ValidationErrorKind::ConflictingKind,
                format!(
                    "`{}` is annotated as more than one kind: {}",
                    self.shape.symbol,
                    names.join(", ")
                ),
            ));
        }
        out.kind = kinds.pop().map(|(_, kind, name, bins)| (kind, name, bins));
        Ok(out)
    }

    fn model_error(&self, annotation: &Annotation, err: ModelError) -> ValidationError {
        let kind = match err {
            ModelError::UnknownTag { .. } => ValidationErrorKind::UnknownAnnotation,
            ModelError::UnknownArgument { .. } => ValidationErrorKind::UnknownAttributeArgument,
            ModelError::Arity { .. } | ModelError::InvalidValue { .. } => {
                ValidationErrorKind::InvalidArguments
            }
        };
        self.error(kind, format!("{} in {}", err, annotation))
    }

    // ---- Shape rules ----

    fn check_shape(&self, kind: CaseKind, c: &Collected) -> Result<(), ValidationError> {
        let symbol = &self.shape.symbol;
        if kind == CaseKind::Fuzz && self.shape.is_member {
            return Err(self.error(
                ValidationErrorKind::MemberFuzzTarget,
                format!("fuzz target `{}` must be a free function, not a member", symbol),
            ));
        }
        if matches!(kind, CaseKind::Test | CaseKind::Fuzz) && !self.shape.returns_void {
            return Err(self.error(
                ValidationErrorKind::NonVoidReturn,
                format!("{} `{}` must return void", kind_noun(kind), symbol),
            ));
        }
        if kind == CaseKind::Fuzz && !c.parameters.is_empty() {
            return Err(self.error(
                ValidationErrorKind::UnsupportedParameterizedFuzz,
                format!(
                    "fuzz target `{}` cannot use `parameters`; derive inputs from `domains` and `seed`",
                    symbol
                ),
            ));
        }
        if kind != CaseKind::Fuzz && (c.domains.is_some() || !c.seeds.is_empty()) {
            let tag = if c.domains.is_some() { "domains" } else { "seed" };
            return Err(self.error(
                ValidationErrorKind::FuzzAnnotationOnNonFuzz,
                format!("`{}` only applies to fuzz targets, `{}` is a {}", tag, symbol, kind_noun(kind)),
            ));
        }
        Ok(())
    }

    // ---- Fuzz inputs ----

    fn fuzz_spec(&self, c: &Collected) -> Result<FuzzSpec, ValidationError> {
        let params = &self.shape.params;
        // (param index, None for a domain input or Some(len param) for a buffer)
        let mut slots: Vec<(usize, Option<Option<usize>>)> = Vec::new();
        let mut idx = 0;
        while idx < params.len() {
            let param = &params[idx];
            match &param.ty {
                ParamType::ByteSpan => {
                    slots.push((idx, Some(None)));
                    idx += 1;
                }
                ParamType::Pointer { byte_like } => {
                    let sized = params.get(idx + 1).is_some_and(|next| {
                        matches!(&next.ty, ParamType::Scalar(s) if s.is_unsigned_integer())
                    });
                    if !*byte_like || !sized {
                        return Err(self.error(
                            ValidationErrorKind::RawPointerWithoutLength,
                            format!(
                                "fuzz target `{}` parameter `{}` is a raw pointer without a length; \
                                 use a byte span or a byte pointer followed by a size parameter",
                                self.shape.symbol, param.name
                            ),
                        ));
                    }
                    slots.push((idx, Some(Some(idx + 1))));
                    idx += 2;
                }
                ParamType::Opaque { type_name } => {
                    return Err(self.error(
                        ValidationErrorKind::UnfuzzableParameter,
                        format!(
                            "fuzz target `{}` parameter `{}` has type `{}` which cannot be generated",
                            self.shape.symbol, param.name, type_name
                        ),
                    ));
                }
                _ => {
                    slots.push((idx, None));
                    idx += 1;
                }
            }
        }
        if slots.is_empty() {
            return Err(self.error(
                ValidationErrorKind::UnfuzzableParameter,
                format!("fuzz target `{}` takes no inputs", self.shape.symbol),
            ));
        }

        let domain_count = slots.iter().filter(|(_, b)| b.is_none()).count();
        if let Some(domains) = &c.domains {
            if domains.len() != domain_count {
                return Err(self.error(
                    ValidationErrorKind::DomainMismatch,
                    format!(
                        "`{}` has {} non-buffer parameter(s) but {} domain(s)",
                        self.shape.symbol,
                        domain_count,
                        domains.len()
                    ),
                ));
            }
        }

        let mut inputs = Vec::with_capacity(slots.len());
        let mut next_domain = 0;
        for (index, buffer) in slots {
            let param = &params[index];
            let source = match buffer {
                Some(len_param) => InputSource::Buffer { len_param },
                None => {
                    let descriptor = c
                        .domains
                        .as_ref()
                        .map(|d| d[next_domain].clone())
                        .unwrap_or_else(|| "arbitrary".to_string());
                    next_domain += 1;
                    let domain = if c.domains.is_some() {
                        resolve(&descriptor, &param.ty)
                    } else {
                        arbitrary_for(&param.ty).ok_or_else(|| {
                            format!("no default domain for a {} parameter", param.ty)
                        })
                    }
                    .map_err(|msg| {
                        self.error(
                            ValidationErrorKind::DomainMismatch,
                            format!("parameter `{}` of `{}`: {}", param.name, self.shape.symbol, msg),
                        )
                    })?;
                    InputSource::Domain {
                        ty: param.ty.clone(),
                        descriptor,
                        domain,
                    }
                }
            };
            inputs.push(FuzzInput {
                param_index: index,
                name: param.name.clone(),
                source,
            });
        }

        let mut seeds = Vec::with_capacity(c.seeds.len());
        for (n, tuple) in c.seeds.iter().enumerate() {
            if tuple.len() != inputs.len() {
                return Err(self.error(
                    ValidationErrorKind::InvalidSeed,
                    format!(
                        "seed #{} of `{}` has {} value(s), expected {}",
                        n + 1,
                        self.shape.symbol,
                        tuple.len(),
                        inputs.len()
                    ),
                ));
            }
            let mut values = Vec::with_capacity(tuple.len());
            for (token, input) in tuple.iter().zip(&inputs) {
                let ty = match &input.source {
                    InputSource::Buffer { .. } => ParamType::ByteSpan,
                    InputSource::Domain { ty, .. } => ty.clone(),
                };
                let value = parse_literal(token, &ty).map_err(|msg| {
                    self.error(
                        ValidationErrorKind::InvalidSeed,
                        format!("seed #{} of `{}`, input `{}`: {}", n + 1, self.shape.symbol, input.name, msg),
                    )
                })?;
                values.push(value);
            }
            seeds.push(values);
        }

        Ok(FuzzSpec { inputs, seeds })
    }

    // ---- Template bindings ----

    fn template_bindings(
        &self,
        bindings: &[(String, String)],
    ) -> Result<Vec<TemplateBinding>, ValidationError> {
        let declared = &self.shape.template_params;
        let mut out: Vec<TemplateBinding> = Vec::with_capacity(bindings.len());
        let mut bound: HashMap<&str, usize> = HashMap::new();

        for (param, arg) in bindings {
            let Some(position) = declared.iter().position(|p| &p.name == param) else {
                let known: Vec<&str> = declared.iter().map(|p| p.name.as_str()).collect();
                let hint = if known.is_empty() {
                    format!("`{}` is not a template", self.shape.symbol)
                } else {
                    format!("declared: {}", known.join(", "))
                };
                return Err(self.error(
                    ValidationErrorKind::UnknownTemplateParameter,
                    format!("`template({}, {})` names an unknown template parameter ({})", param, arg, hint),
                ));
            };
            if bound.insert(param.as_str(), position).is_some() {
                return Err(self.error(
                    ValidationErrorKind::DuplicateAnnotation,
                    format!("template parameter `{}` is bound more than once", param),
                ));
            }
            out.push(TemplateBinding {
                param: param.clone(),
                kind: declared[position].kind,
                arg: arg.clone(),
            });
        }

        // The kind sequence of the bindings, collapsed into runs, must match
        // the declared kind sequence of the same parameters.
        let binding_runs = kind_runs(out.iter().map(|b| b.kind));
        let mut positions: Vec<usize> = bound.values().copied().collect();
        positions.sort_unstable();
        let declared_runs = kind_runs(positions.iter().map(|&p| declared[p].kind));
        if binding_runs != declared_runs {
            let order: Vec<String> = declared
                .iter()
                .map(|p| format!("{} {}", p.kind, p.name))
                .collect();
            let given: Vec<String> = out.iter().map(|b| format!("{} {}", b.kind, b.param)).collect();
            return Err(self.error(
                ValidationErrorKind::InterleavedTemplateBindingOrder,
                format!(
                    "template bindings [{}] interleave type and non-type parameters out of declaration order [{}]",
                    given.join(", "),
                    order.join(", ")
                ),
            ));
        }

        if let Some(missing) = declared.iter().find(|p| !bound.contains_key(p.name.as_str())) {
            return Err(self.error(
                ValidationErrorKind::MissingTemplateBinding,
                format!(
                    "{} template parameter `{}` of `{}` has no `template` binding",
                    missing.kind, missing.name, self.shape.symbol
                ),
            ));
        }
        Ok(out)
    }

    // ---- Data-driven parameters ----

    fn parameter_sets(
        &self,
        kind: CaseKind,
        c: &Collected,
    ) -> Result<Vec<ParameterSet>, ValidationError> {
        if kind == CaseKind::Fuzz {
            return Ok(Vec::new());
        }
        let mut sets: Vec<ParameterSet> = Vec::with_capacity(c.parameters.len());
        for (param, raw_values) in &c.parameters {
            let Some(index) = self.shape.param_index(param) else {
                return Err(self.error(
                    ValidationErrorKind::ParameterBinding,
                    format!("`parameters({}, ..)`: `{}` has no parameter `{}`", param, self.shape.symbol, param),
                ));
            };
            if sets.iter().any(|s| s.index == index) {
                return Err(self.error(
                    ValidationErrorKind::DuplicateAnnotation,
                    format!("parameter `{}` has more than one `parameters` annotation", param),
                ));
            }
            let ty = &self.shape.params[index].ty;
            let values = raw_values
                .iter()
                .map(|tok| parse_literal(tok, ty))
                .collect::<Result<Vec<ArgValue>, String>>()
                .map_err(|msg| {
                    self.error(
                        ValidationErrorKind::ParameterBinding,
                        format!("`parameters({}, ..)`: {}", param, msg),
                    )
                })?;
            sets.push(ParameterSet {
                param: param.clone(),
                index,
                values,
            });
        }

        // A fixture case may leave one parameter unbound: the fixture handle.
        let allowed_unbound = usize::from(c.fixture.is_some() && sets.is_empty());
        let unbound: Vec<&str> = self
            .shape
            .params
            .iter()
            .enumerate()
            .filter(|(i, _)| !sets.iter().any(|s| s.index == *i))
            .map(|(_, p)| p.name.as_str())
            .collect();
        if unbound.len() > allowed_unbound {
            return Err(self.error(
                ValidationErrorKind::ParameterBinding,
                format!(
                    "{} `{}` parameter(s) {} have no values; add `parameters(name, ..)`",
                    kind_noun(kind),
                    self.shape.symbol,
                    unbound
                        .iter()
                        .map(|n| format!("`{}`", n))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
        Ok(sets)
    }
}

fn kind_runs(kinds: impl Iterator<Item = TemplateParamKind>) -> Vec<TemplateParamKind> {
    let mut runs: Vec<TemplateParamKind> = Vec::new();
    for kind in kinds {
        if runs.last() != Some(&kind) {
            runs.push(kind);
        }
    }
    runs
}

fn kind_noun(kind: CaseKind) -> &'static str {
    match kind {
        CaseKind::Test => "test",
        CaseKind::Fuzz => "fuzz target",
        CaseKind::Benchmark => "benchmark",
        CaseKind::Jitter => "jitter benchmark",
        CaseKind::Baseline => "baseline",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casefile_types::{ScalarType, TemplateParam};

    fn loc() -> SourceLocation {
        SourceLocation::new("tests/unit.cpp", 42)
    }

    fn err_kind(anns: &[Annotation], shape: &DeclarationShape) -> ValidationErrorKind {
        validate(anns, shape).unwrap_err().kind
    }

    #[test]
    fn test_separator_in_identity_rejected() {
        let shape = DeclarationShape::free_fn("f", loc());
        let err = validate(&[Annotation::new("test").arg("io/read")], &shape).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidArguments);
        assert!(err.message.contains("case name `io/read`"));

        let in_suite = [
            Annotation::new("test").arg("read"),
            Annotation::new("suite").arg("io/disk"),
        ];
        assert_eq!(err_kind(&in_suite, &shape), ValidationErrorKind::InvalidArguments);
    }

    #[test]
    fn test_suite_defaults() {
        let shape = DeclarationShape::free_fn("f", loc());
        let spec = validate(&[Annotation::new("test").arg("t")], &shape).unwrap();
        assert_eq!(spec.id, CaseId::new("default", "t"));

        let scoped = shape.clone().with_scope("math");
        let spec = validate(&[Annotation::new("test").arg("t")], &scoped).unwrap();
        assert_eq!(spec.suite(), "math");

        let spec = validate(
            &[Annotation::new("test").arg("t"), Annotation::new("suite").arg("io")],
            &scoped,
        )
        .unwrap();
        assert_eq!(spec.suite(), "io");
    }

    #[test]
    fn test_owner_and_group_become_tags() {
        let shape = DeclarationShape::free_fn("f", loc());
        let spec = validate(
            &[
                Annotation::new("test").arg("t"),
                Annotation::new("owner").arg("core"),
                Annotation::new("tags").args(["fast"]),
            ],
            &shape,
        )
        .unwrap();
        let tags: Vec<&str> = spec.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["fast", "owner=core"]);
    }

    #[test]
    fn test_kind_rules() {
        let shape = DeclarationShape::free_fn("f", loc());
        assert_eq!(err_kind(&[], &shape), ValidationErrorKind::MissingKind);
        assert_eq!(
            err_kind(
                &[Annotation::new("test").arg("a"), Annotation::new("bench").arg("b")],
                &shape
            ),
            ValidationErrorKind::ConflictingKind
        );
        assert_eq!(
            err_kind(
                &[Annotation::new("test").arg("a"), Annotation::new("test").arg("b")],
                &shape
            ),
            ValidationErrorKind::DuplicateAnnotation
        );
        assert_eq!(
            err_kind(
                &[
                    Annotation::new("test").arg("a"),
                    Annotation::new("skip"),
                    Annotation::new("skip")
                ],
                &shape
            ),
            ValidationErrorKind::DuplicateAnnotation
        );
    }

    #[test]
    fn test_benchmarks_may_return_a_value() {
        let shape = DeclarationShape::free_fn("f", loc()).returning_value();
        assert!(validate(&[Annotation::new("bench").arg("b")], &shape).is_ok());
        assert_eq!(
            err_kind(&[Annotation::new("test").arg("t")], &shape),
            ValidationErrorKind::NonVoidReturn
        );
    }

    #[test]
    fn test_fuzz_defaults_to_arbitrary_domains() {
        let shape = DeclarationShape::free_fn("f", loc())
            .with_param("n", ParamType::Scalar(ScalarType::U8))
            .with_param("data", ParamType::Pointer { byte_like: true })
            .with_param("len", ParamType::Scalar(ScalarType::Size));
        let spec = validate(&[Annotation::new("fuzz").arg("f")], &shape).unwrap();
        let fuzz = spec.fuzz.unwrap();
        assert_eq!(fuzz.inputs.len(), 2);
        assert_eq!(fuzz.domains().collect::<Vec<_>>(), vec![(0, "arbitrary")]);
        assert_eq!(
            fuzz.inputs[1].source,
            InputSource::Buffer { len_param: Some(2) }
        );
        assert!(!fuzz.is_raw_bytes());
    }

    #[test]
    fn test_domain_mismatch() {
        let shape = DeclarationShape::free_fn("f", loc())
            .with_param("a", ParamType::Scalar(ScalarType::I32))
            .with_param("s", ParamType::String);
        let too_few = [
            Annotation::new("fuzz").arg("f"),
            Annotation::new("domains").arg("in_range(0, 3)"),
        ];
        assert_eq!(err_kind(&too_few, &shape), ValidationErrorKind::DomainMismatch);
        let wrong_type = [
            Annotation::new("fuzz").arg("f"),
            Annotation::new("domains").args(["alpha_string", "in_range(0, 3)"]),
        ];
        assert_eq!(err_kind(&wrong_type, &shape), ValidationErrorKind::DomainMismatch);
    }

    #[test]
    fn test_seed_arity_and_literals() {
        let shape = DeclarationShape::free_fn("f", loc())
            .with_param("a", ParamType::Scalar(ScalarType::I32))
            .with_param("s", ParamType::String);
        let short = [
            Annotation::new("fuzz").arg("f"),
            Annotation::new("seed").arg("1"),
        ];
        assert_eq!(err_kind(&short, &shape), ValidationErrorKind::InvalidSeed);
        let bad = [
            Annotation::new("fuzz").arg("f"),
            Annotation::new("seed").args(["one", "\"x\""]),
        ];
        assert_eq!(err_kind(&bad, &shape), ValidationErrorKind::InvalidSeed);
    }

    #[test]
    fn test_domains_on_test_rejected() {
        let shape = DeclarationShape::free_fn("f", loc());
        let anns = [
            Annotation::new("test").arg("t"),
            Annotation::new("seed").arg("1"),
        ];
        assert_eq!(err_kind(&anns, &shape), ValidationErrorKind::FuzzAnnotationOnNonFuzz);
    }

    #[test]
    fn test_opaque_fuzz_parameter() {
        let shape = DeclarationShape::free_fn("f", loc()).with_param(
            "w",
            ParamType::Opaque {
                type_name: "Widget".into(),
            },
        );
        assert_eq!(
            err_kind(&[Annotation::new("fuzz").arg("f")], &shape),
            ValidationErrorKind::UnfuzzableParameter
        );
    }

    #[test]
    fn test_template_rules() {
        let shape = DeclarationShape::free_fn("f", loc())
            .with_template_param(TemplateParam::ty("T"))
            .with_template_param(TemplateParam::non_type("N"));
        let ok = validate(
            &[
                Annotation::new("test").arg("t"),
                Annotation::new("template").args(["T", "int"]),
                Annotation::new("template").args(["N", "4"]),
            ],
            &shape,
        )
        .unwrap();
        assert_eq!(ok.template_bindings.len(), 2);

        let unknown = [
            Annotation::new("test").arg("t"),
            Annotation::new("template").args(["U", "int"]),
        ];
        assert_eq!(err_kind(&unknown, &shape), ValidationErrorKind::UnknownTemplateParameter);

        let missing = [
            Annotation::new("test").arg("t"),
            Annotation::new("template").args(["T", "int"]),
        ];
        assert_eq!(err_kind(&missing, &shape), ValidationErrorKind::MissingTemplateBinding);

        let repeated = [
            Annotation::new("test").arg("t"),
            Annotation::new("template").args(["T", "int"]),
            Annotation::new("template").args(["T", "long"]),
        ];
        assert_eq!(err_kind(&repeated, &shape), ValidationErrorKind::DuplicateAnnotation);
    }

    #[test]
    fn test_parameters_binding() {
        let shape = DeclarationShape::free_fn("f", loc())
            .with_param("n", ParamType::Scalar(ScalarType::I32));
        let spec = validate(
            &[
                Annotation::new("test").arg("t"),
                Annotation::new("parameters").args(["n", "1", "2", "3"]),
            ],
            &shape,
        )
        .unwrap();
        assert_eq!(spec.parameter_rows().len(), 3);

        let unbound = [Annotation::new("test").arg("t")];
        assert_eq!(err_kind(&unbound, &shape), ValidationErrorKind::ParameterBinding);

        let wrong_name = [
            Annotation::new("test").arg("t"),
            Annotation::new("parameters").args(["m", "1"]),
        ];
        assert_eq!(err_kind(&wrong_name, &shape), ValidationErrorKind::ParameterBinding);

        let bad_literal = [
            Annotation::new("test").arg("t"),
            Annotation::new("parameters").args(["n", "x"]),
        ];
        assert_eq!(err_kind(&bad_literal, &shape), ValidationErrorKind::ParameterBinding);
    }

    #[test]
    fn test_fixture_handle_may_stay_unbound() {
        let shape = DeclarationShape::free_fn("f", loc()).with_param(
            "db",
            ParamType::Opaque {
                type_name: "Db&".into(),
            },
        );
        let spec = validate(
            &[
                Annotation::new("test").arg("t"),
                Annotation::new("fixture").arg("db").named("lifetime", "suite"),
            ],
            &shape,
        )
        .unwrap();
        assert_eq!(spec.fixture_lifetime, FixtureLifetime::PerSuite);
    }

    #[test]
    fn test_error_display() {
        let shape = DeclarationShape::free_fn("f", loc()).member();
        let err = validate(&[Annotation::new("fuzz").arg("x")], &shape).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tests/unit.cpp:42: error[MemberFuzzTargetError]: fuzz target `f` must be a free function, not a member"
        );
    }
}
