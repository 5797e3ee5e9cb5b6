//! Concrete argument values passed to typed case bodies and fuzz targets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single argument value.
///
/// Integers of every declared width travel as `i128`, which covers the full
/// range of both `i64` and `u64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl ArgValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_int().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ArgValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Rough size used by the shrinker to compare candidates.
    pub fn complexity(&self) -> u128 {
        match self {
            ArgValue::Bool(b) => *b as u128,
            ArgValue::Int(v) => v.unsigned_abs(),
            ArgValue::Float(v) => {
                if v.is_finite() {
                    v.abs() as u128
                } else {
                    u128::MAX
                }
            }
            ArgValue::Str(s) => s.len() as u128,
            ArgValue::Bytes(b) => b.len() as u128,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Int(v) => write!(f, "{}", v),
            ArgValue::Float(v) => write!(f, "{}", v),
            ArgValue::Str(s) => write!(f, "{:?}", s),
            ArgValue::Bytes(b) => {
                write!(f, "b\"")?;
                for byte in b {
                    write!(f, "{}", std::ascii::escape_default(*byte))?;
                }
                write!(f, "\"")
            }
        }
    }
}

/// Render an argument tuple as `(a, b, c)`.
pub fn format_tuple(values: &[ArgValue]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ArgValue::Int(-3).to_string(), "-3");
        assert_eq!(ArgValue::Str("a\"b".into()).to_string(), "\"a\\\"b\"");
        assert_eq!(ArgValue::Bytes(vec![b'h', 0]).to_string(), "b\"h\\x00\"");
        assert_eq!(
            format_tuple(&[ArgValue::Int(1), ArgValue::Str("alpha".into())]),
            "(1, \"alpha\")"
        );
    }

    #[test]
    fn test_wide_integers_survive_json() {
        let v = ArgValue::Int(u64::MAX as i128);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "{\"int\":18446744073709551615}");
        let back: ArgValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert_eq!(back.as_u64(), Some(u64::MAX));
        assert_eq!(back.as_i64(), None);
    }
}
