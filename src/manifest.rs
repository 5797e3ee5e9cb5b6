//! Loading declaration manifests for the `casefile` tool.
//!
//! Manifests carry declarations only. Each one is bound to a stand-in
//! callable of the signature its shape expects, so the usual validation,
//! emission and aggregation paths apply unchanged.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use casefile_core::{register_module, validate_declaration, Invoker, ModuleEntry, Signature, UnitRecords};
use casefile_types::DeclarationManifest;

pub fn load_manifest(path: &Path) -> Result<DeclarationManifest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    DeclarationManifest::from_json(&json)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))
}

fn stand_in(signature: Signature) -> Invoker {
    const REASON: &str = "declaration only, no body linked";
    match signature {
        Signature::NoArg => Invoker::no_arg(|ctx| ctx.skip(REASON)),
        Signature::FixtureArg => Invoker::fixture(|ctx, _| ctx.skip(REASON)),
        Signature::Bytes => Invoker::bytes(|ctx, _| ctx.skip(REASON)),
        Signature::TypedArgs => Invoker::typed(|ctx, _| ctx.skip(REASON)),
    }
}

/// Validate and register every declaration of a manifest.
pub fn manifest_unit(manifest: DeclarationManifest) -> UnitRecords {
    let entries = manifest
        .declarations
        .into_iter()
        .map(|declaration| {
            // Invalid declarations get any stand-in; registration reports them.
            let signature = validate_declaration(&declaration)
                .map(|spec| spec.expected_signature())
                .unwrap_or(Signature::NoArg);
            ModuleEntry::new(declaration, stand_in(signature))
        })
        .collect();
    register_module(manifest.unit, entries, Vec::new())
}

pub fn load_units<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<UnitRecords>> {
    paths
        .iter()
        .map(|p| load_manifest(p.as_ref()).map(manifest_unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use casefile_types::{Annotation, Declaration, DeclarationShape, ParamType, SourceLocation};

    #[test]
    fn test_manifest_declarations_register() {
        let manifest = DeclarationManifest {
            unit: "smoke".into(),
            declarations: vec![
                Declaration::new(DeclarationShape::free_fn("a", SourceLocation::new("s.cpp", 1)))
                    .annotate(Annotation::new("test").arg("a")),
                Declaration::new(
                    DeclarationShape::free_fn("f", SourceLocation::new("s.cpp", 5))
                        .with_param("data", ParamType::ByteSpan),
                )
                .annotate(Annotation::new("fuzz").arg("f")),
                Declaration::new(DeclarationShape::free_fn("m", SourceLocation::new("s.cpp", 9)).member())
                    .annotate(Annotation::new("fuzz").arg("m")),
            ],
        };
        let unit = manifest_unit(manifest);
        assert_eq!(unit.records.len(), 2);
        assert_eq!(unit.diagnostics.len(), 1);
        assert_eq!(unit.diagnostics[0].rule, "MemberFuzzTargetError");
    }

    #[test]
    fn test_unreadable_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{").unwrap();
        let err = load_manifest(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse manifest"));
    }
}
