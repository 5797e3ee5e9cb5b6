//! Normalized static shape of an annotated declaration.
//!
//! The scanner that walks host-language sources is an external
//! collaborator; it reports only what the validator needs to know about a
//! function, and the core never looks at source text itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// File and line of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Scalar parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Bool,
    Int { signed: bool, bits: u8 },
    /// Unsigned pointer-width size (`size_t`, `usize`).
    Size,
    Float { bits: u8 },
}

impl ScalarType {
    pub const I32: ScalarType = ScalarType::Int {
        signed: true,
        bits: 32,
    };
    pub const I64: ScalarType = ScalarType::Int {
        signed: true,
        bits: 64,
    };
    pub const U8: ScalarType = ScalarType::Int {
        signed: false,
        bits: 8,
    };
    pub const U32: ScalarType = ScalarType::Int {
        signed: false,
        bits: 32,
    };
    pub const U64: ScalarType = ScalarType::Int {
        signed: false,
        bits: 64,
    };
    pub const F64: ScalarType = ScalarType::Float { bits: 64 };

    /// Inclusive integer bounds, `None` for bool and floats.
    pub fn int_bounds(&self) -> Option<(i128, i128)> {
        match *self {
            ScalarType::Int { signed, bits } => {
                let bits = bits.clamp(1, 127) as u32;
                if signed {
                    let half = 1i128 << (bits - 1);
                    Some((-half, half - 1))
                } else {
                    let max = if bits >= 127 {
                        i128::MAX
                    } else {
                        (1i128 << bits) - 1
                    };
                    Some((0, max))
                }
            }
            ScalarType::Size => Some((0, u64::MAX as i128)),
            ScalarType::Bool | ScalarType::Float { .. } => None,
        }
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            ScalarType::Size | ScalarType::Int { signed: false, .. }
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::Int { signed: true, bits } => write!(f, "i{}", bits),
            ScalarType::Int {
                signed: false,
                bits,
            } => write!(f, "u{}", bits),
            ScalarType::Size => write!(f, "usize"),
            ScalarType::Float { bits } => write!(f, "f{}", bits),
        }
    }
}

/// Parameter type classes the validator distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Scalar(ScalarType),
    /// Any string-like type (owned string, string view, ...).
    String,
    /// A contiguous byte view that carries its own length.
    ByteSpan,
    /// A raw pointer. Byte-like pointers followed by an unsigned size
    /// parameter form a buffer pair.
    Pointer { byte_like: bool },
    /// Anything else; carried for diagnostics only.
    Opaque { type_name: String },
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Scalar(s) => write!(f, "{}", s),
            ParamType::String => write!(f, "string"),
            ParamType::ByteSpan => write!(f, "bytes"),
            ParamType::Pointer { byte_like: true } => write!(f, "*const u8"),
            ParamType::Pointer { byte_like: false } => write!(f, "*const _"),
            ParamType::Opaque { type_name } => write!(f, "{}", type_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateParamKind {
    Type,
    NonType,
}

impl fmt::Display for TemplateParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateParamKind::Type => write!(f, "type"),
            TemplateParamKind::NonType => write!(f, "non-type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: String,
    pub kind: TemplateParamKind,
}

impl TemplateParam {
    pub fn ty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TemplateParamKind::Type,
        }
    }

    pub fn non_type(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TemplateParamKind::NonType,
        }
    }
}

/// Facts about one annotated function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationShape {
    /// Qualified symbol name, used for diagnostics.
    pub symbol: String,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "default_true")]
    pub returns_void: bool,
    /// Template parameters in source order.
    #[serde(default)]
    pub template_params: Vec<TemplateParam>,
    /// Enclosing namespace/module, used as the default suite.
    #[serde(default)]
    pub scope: Option<String>,
    pub location: SourceLocation,
}

fn default_true() -> bool {
    true
}

impl DeclarationShape {
    /// A free `void` function without parameters.
    pub fn free_fn(symbol: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            symbol: symbol.into(),
            is_member: false,
            params: Vec::new(),
            returns_void: true,
            template_params: Vec::new(),
            scope: None,
            location,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn with_template_param(mut self, param: TemplateParam) -> Self {
        self.template_params.push(param);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn member(mut self) -> Self {
        self.is_member = true;
        self
    }

    pub fn returning_value(mut self) -> Self {
        self.returns_void = false;
        self
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bounds() {
        assert_eq!(ScalarType::I32.int_bounds(), Some((-2147483648, 2147483647)));
        assert_eq!(ScalarType::U8.int_bounds(), Some((0, 255)));
        assert_eq!(ScalarType::Size.int_bounds(), Some((0, u64::MAX as i128)));
        assert_eq!(ScalarType::F64.int_bounds(), None);
    }

    #[test]
    fn test_shape_json_defaults() {
        let json = r#"{
            "symbol": "ns::check",
            "params": [{"name": "v", "ty": {"scalar": {"int": {"signed": true, "bits": 32}}}}],
            "location": {"file": "tests/a.cpp", "line": 7}
        }"#;
        let shape: DeclarationShape = serde_json::from_str(json).unwrap();
        assert!(shape.returns_void);
        assert!(!shape.is_member);
        assert_eq!(shape.params[0].ty, ParamType::Scalar(ScalarType::I32));
        assert_eq!(shape.location.to_string(), "tests/a.cpp:7");
    }
}
