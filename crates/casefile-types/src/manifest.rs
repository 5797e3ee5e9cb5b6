//! Declaration manifests: the scanner's per-unit output.

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::shape::DeclarationShape;

/// One annotated declaration: its metadata plus its static shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub annotations: Vec<Annotation>,
    pub shape: DeclarationShape,
}

impl Declaration {
    pub fn new(shape: DeclarationShape) -> Self {
        Self {
            annotations: Vec::new(),
            shape,
        }
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// All declarations contributed by one independently compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationManifest {
    pub unit: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

impl DeclarationManifest {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = r#"{
            "unit": "tests/smoke",
            "declarations": [{
                "annotations": [{"tag": "fuzz", "args": ["smoke/bytes"]}],
                "shape": {
                    "symbol": "fuzz_bytes",
                    "params": [{"name": "data", "ty": "byte_span"}],
                    "location": {"file": "smoke.cpp", "line": 12}
                }
            }]
        }"#;
        let manifest = DeclarationManifest::from_json(json).unwrap();
        assert_eq!(manifest.unit, "tests/smoke");
        assert_eq!(manifest.declarations.len(), 1);
        assert_eq!(manifest.declarations[0].annotations[0].tag, "fuzz");
    }
}
