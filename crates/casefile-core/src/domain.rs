//! Fuzz input domains and literal parsing.
//!
//! A domain descriptor is written as a call-like token, e.g. `in_range(0, 10)`
//! or `alpha_string(8)`. [`resolve`] checks it against the parameter type and
//! produces a [`ResolvedDomain`] the value generator can sample directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use casefile_types::{ArgValue, ParamType, ScalarType};

/// Character classes for string domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    /// Bytes 0x00..=0x7F.
    Ascii,
    /// 0x20..=0x7E.
    Printable,
    Alpha,
    Alnum,
    Numeric,
    /// Any Unicode scalar value.
    Utf8,
}

impl CharClass {
    pub fn contains(&self, c: char) -> bool {
        match self {
            CharClass::Ascii => c.is_ascii(),
            CharClass::Printable => (' '..='~').contains(&c),
            CharClass::Alpha => c.is_ascii_alphabetic(),
            CharClass::Alnum => c.is_ascii_alphanumeric(),
            CharClass::Numeric => c.is_ascii_digit(),
            CharClass::Utf8 => true,
        }
    }

    /// Smallest member, the shrink target for replaced characters.
    pub fn simplest(&self) -> char {
        match self {
            CharClass::Ascii | CharClass::Printable | CharClass::Alpha | CharClass::Alnum => 'a',
            CharClass::Numeric => '0',
            CharClass::Utf8 => 'a',
        }
    }
}

/// A domain after it has been checked against its parameter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedDomain {
    Bool,
    Int {
        min: i128,
        max: i128,
        exclude_zero: bool,
    },
    Float {
        min: f64,
        max: f64,
        exclude_zero: bool,
    },
    Choice(Vec<ArgValue>),
    Text {
        class: CharClass,
        max_len: Option<usize>,
    },
}

impl ResolvedDomain {
    /// Whether `value` satisfies this domain.
    pub fn contains(&self, value: &ArgValue) -> bool {
        match (self, value) {
            (ResolvedDomain::Bool, ArgValue::Bool(_)) => true,
            (
                ResolvedDomain::Int {
                    min,
                    max,
                    exclude_zero,
                },
                ArgValue::Int(v),
            ) => v >= min && v <= max && !(*exclude_zero && *v == 0),
            (
                ResolvedDomain::Float {
                    min,
                    max,
                    exclude_zero,
                },
                ArgValue::Float(v),
            ) => v >= min && v <= max && !(*exclude_zero && *v == 0.0),
            (ResolvedDomain::Choice(options), v) => options.contains(v),
            (ResolvedDomain::Text { class, max_len }, ArgValue::Str(s)) => {
                max_len.map_or(true, |m| s.chars().count() <= m) && s.chars().all(|c| class.contains(c))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ResolvedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedDomain::Bool => write!(f, "bool"),
            ResolvedDomain::Int { min, max, exclude_zero } => {
                write!(f, "[{}, {}]", min, max)?;
                if *exclude_zero {
                    write!(f, " \\ {{0}}")?;
                }
                Ok(())
            }
            ResolvedDomain::Float { min, max, exclude_zero } => {
                write!(f, "[{}, {}]", min, max)?;
                if *exclude_zero {
                    write!(f, " \\ {{0}}")?;
                }
                Ok(())
            }
            ResolvedDomain::Choice(options) => {
                write!(f, "{}", casefile_types::format_tuple(options))
            }
            ResolvedDomain::Text { class, max_len } => match max_len {
                Some(m) => write!(f, "{:?} string, len <= {}", class, m),
                None => write!(f, "{:?} string", class),
            },
        }
    }
}

/// A descriptor split into its name and raw argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDescriptor {
    pub name: String,
    pub args: Vec<String>,
}

impl DomainDescriptor {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match raw.find('(') {
            None => {
                if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(format!("malformed domain `{}`", raw));
                }
                Ok(Self {
                    name: raw.to_ascii_lowercase(),
                    args: Vec::new(),
                })
            }
            Some(open) => {
                if !raw.ends_with(')') {
                    return Err(format!("malformed domain `{}`: missing `)`", raw));
                }
                let name = raw[..open].trim().to_ascii_lowercase();
                let inner = &raw[open + 1..raw.len() - 1];
                Ok(Self {
                    name,
                    args: split_args(inner)?,
                })
            }
        }
    }
}

/// Parse a descriptor and check it fits `ty`.
pub fn resolve(raw: &str, ty: &ParamType) -> Result<ResolvedDomain, String> {
    let desc = DomainDescriptor::parse(raw)?;
    let arity = |n: usize| -> Result<(), String> {
        if desc.args.len() == n {
            Ok(())
        } else {
            Err(format!(
                "`{}` takes {} argument(s), got {}",
                desc.name,
                n,
                desc.args.len()
            ))
        }
    };
    let mismatch = || format!("domain `{}` does not apply to a {} parameter", desc.name, ty);

    match desc.name.as_str() {
        "arbitrary" | "any" => {
            arity(0)?;
            arbitrary_for(ty).ok_or_else(mismatch)
        }
        "positive" | "non_negative" | "negative" | "non_zero" => {
            arity(0)?;
            let base = match ty {
                ParamType::Scalar(s @ (ScalarType::Int { .. } | ScalarType::Size)) => {
                    arbitrary_for(&ParamType::Scalar(*s))
                }
                ParamType::Scalar(ScalarType::Float { .. }) => arbitrary_for(ty),
                _ => None,
            }
            .ok_or_else(mismatch)?;
            narrow_sign(base, &desc.name)
        }
        "in_range" => {
            arity(2)?;
            match ty {
                ParamType::Scalar(s @ (ScalarType::Int { .. } | ScalarType::Size)) => {
                    let (lo, hi) = s.int_bounds().ok_or_else(mismatch)?;
                    let min = parse_int(&desc.args[0])?;
                    let max = parse_int(&desc.args[1])?;
                    if min > max {
                        return Err(format!("empty range [{}, {}]", min, max));
                    }
                    if min < lo || max > hi {
                        return Err(format!(
                            "range [{}, {}] exceeds {} bounds [{}, {}]",
                            min, max, s, lo, hi
                        ));
                    }
                    Ok(ResolvedDomain::Int {
                        min,
                        max,
                        exclude_zero: false,
                    })
                }
                ParamType::Scalar(ScalarType::Float { .. }) => {
                    let min = parse_float(&desc.args[0])?;
                    let max = parse_float(&desc.args[1])?;
                    if !(min <= max) {
                        return Err(format!("empty range [{}, {}]", min, max));
                    }
                    Ok(ResolvedDomain::Float {
                        min,
                        max,
                        exclude_zero: false,
                    })
                }
                _ => Err(mismatch()),
            }
        }
        "element_of" => {
            if desc.args.is_empty() {
                return Err("`element_of` needs at least one value".to_string());
            }
            let options = desc
                .args
                .iter()
                .map(|tok| parse_literal(tok, ty))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ResolvedDomain::Choice(options))
        }
        name if name.ends_with("_string") => {
            let class = match name {
                "ascii_string" => CharClass::Ascii,
                "printable_string" => CharClass::Printable,
                "alpha_string" => CharClass::Alpha,
                "alnum_string" => CharClass::Alnum,
                "numeric_string" => CharClass::Numeric,
                "utf8_string" => CharClass::Utf8,
                _ => return Err(format!("unknown domain `{}`", name)),
            };
            if *ty != ParamType::String {
                return Err(mismatch());
            }
            let max_len = match desc.args.len() {
                0 => None,
                1 => Some(
                    desc.args[0]
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| format!("invalid max length `{}`", desc.args[0]))?,
                ),
                n => return Err(format!("`{}` takes at most 1 argument, got {}", name, n)),
            };
            Ok(ResolvedDomain::Text { class, max_len })
        }
        other => Err(format!("unknown domain `{}`", other)),
    }
}

/// The unconstrained domain for a parameter type, `None` if not fuzzable.
pub fn arbitrary_for(ty: &ParamType) -> Option<ResolvedDomain> {
    match ty {
        ParamType::Scalar(ScalarType::Bool) => Some(ResolvedDomain::Bool),
        ParamType::Scalar(s @ (ScalarType::Int { .. } | ScalarType::Size)) => {
            s.int_bounds().map(|(min, max)| ResolvedDomain::Int {
                min,
                max,
                exclude_zero: false,
            })
        }
        ParamType::Scalar(ScalarType::Float { bits }) => {
            let (min, max) = if *bits <= 32 {
                (f32::MIN as f64, f32::MAX as f64)
            } else {
                (f64::MIN, f64::MAX)
            };
            Some(ResolvedDomain::Float {
                min,
                max,
                exclude_zero: false,
            })
        }
        ParamType::String => Some(ResolvedDomain::Text {
            class: CharClass::Utf8,
            max_len: None,
        }),
        _ => None,
    }
}

fn narrow_sign(base: ResolvedDomain, name: &str) -> Result<ResolvedDomain, String> {
    match base {
        ResolvedDomain::Int { min, max, .. } => {
            let (lo, hi, nz) = match name {
                "positive" => (min.max(1), max, false),
                "non_negative" => (min.max(0), max, false),
                "negative" => (min, max.min(-1), false),
                _ => (min, max, true),
            };
            if lo > hi {
                return Err(format!("`{}` is empty for an unsigned parameter", name));
            }
            Ok(ResolvedDomain::Int {
                min: lo,
                max: hi,
                exclude_zero: nz,
            })
        }
        ResolvedDomain::Float { min, max, .. } => {
            let (lo, hi, nz) = match name {
                "positive" => (f64::MIN_POSITIVE, max, false),
                "non_negative" => (0.0, max, false),
                "negative" => (min, -f64::MIN_POSITIVE, false),
                _ => (min, max, true),
            };
            Ok(ResolvedDomain::Float {
                min: lo,
                max: hi,
                exclude_zero: nz,
            })
        }
        other => Ok(other),
    }
}

/// Parse a literal token as a value of parameter type `ty`.
///
/// Strings and byte buffers accept quoted (`"a\"b"`) or bare tokens.
pub fn parse_literal(token: &str, ty: &ParamType) -> Result<ArgValue, String> {
    let token = token.trim();
    match ty {
        ParamType::Scalar(ScalarType::Bool) => match token {
            "true" | "1" => Ok(ArgValue::Bool(true)),
            "false" | "0" => Ok(ArgValue::Bool(false)),
            _ => Err(format!("`{}` is not a bool literal", token)),
        },
        ParamType::Scalar(s @ (ScalarType::Int { .. } | ScalarType::Size)) => {
            let v = parse_int(token)?;
            match s.int_bounds() {
                Some((lo, hi)) if v < lo || v > hi => {
                    Err(format!("{} is out of range for {}", v, s))
                }
                _ => Ok(ArgValue::Int(v)),
            }
        }
        ParamType::Scalar(ScalarType::Float { .. }) => parse_float(token).map(ArgValue::Float),
        ParamType::String => unquote(token).map(ArgValue::Str),
        ParamType::ByteSpan | ParamType::Pointer { .. } => {
            unquote(token).map(|s| ArgValue::Bytes(s.into_bytes()))
        }
        ParamType::Opaque { type_name } => {
            Err(format!("cannot write a literal of type `{}`", type_name))
        }
    }
}

fn parse_int(token: &str) -> Result<i128, String> {
    let t = token.trim().replace('_', "");
    let (neg, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(&t)),
    };
    let digits = digits.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16)
    } else {
        digits.parse::<i128>()
    };
    parsed
        .map(|v| if neg { -v } else { v })
        .map_err(|_| format!("`{}` is not an integer literal", token.trim()))
}

fn parse_float(token: &str) -> Result<f64, String> {
    let t = token.trim().trim_end_matches(['f', 'F']);
    t.parse::<f64>()
        .map_err(|_| format!("`{}` is not a floating-point literal", token.trim()))
}

fn unquote(token: &str) -> Result<String, String> {
    let Some(inner) = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .filter(|_| token.len() >= 2)
    else {
        return Ok(token.to_string());
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(format!("unknown escape `\\{}`", other)),
            None => return Err("dangling `\\` in string literal".to_string()),
        }
    }
    Ok(out)
}

/// Split `a, "b, c", d` on top-level commas, keeping quoted commas.
pub fn split_args(inner: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth = 0usize;
    for c in inner.chars() {
        if in_quotes {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced `)`".to_string())?;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated string literal".to_string());
    }
    if depth != 0 {
        return Err("unbalanced `(`".to_string());
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current.trim().to_string());
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args_respects_quotes() {
        assert_eq!(split_args(r#"1, "a, b", 3"#).unwrap(), vec!["1", "\"a, b\"", "3"]);
        assert!(split_args("").unwrap().is_empty());
        assert!(split_args("\"open").is_err());
    }

    #[test]
    fn test_resolve_ranges() {
        let d = resolve("in_range(-5, 5)", &ParamType::Scalar(ScalarType::I32)).unwrap();
        assert_eq!(
            d,
            ResolvedDomain::Int {
                min: -5,
                max: 5,
                exclude_zero: false
            }
        );
        assert!(resolve("in_range(5, -5)", &ParamType::Scalar(ScalarType::I32)).is_err());
        assert!(resolve("in_range(0, 300)", &ParamType::Scalar(ScalarType::U8)).is_err());
        assert!(resolve("in_range(0, 3)", &ParamType::String).is_err());
    }

    #[test]
    fn test_sign_domains() {
        let d = resolve("positive", &ParamType::Scalar(ScalarType::U8)).unwrap();
        assert_eq!(
            d,
            ResolvedDomain::Int {
                min: 1,
                max: 255,
                exclude_zero: false
            }
        );
        assert!(resolve("negative", &ParamType::Scalar(ScalarType::U32)).is_err());
        let d = resolve("non_zero", &ParamType::Scalar(ScalarType::I64)).unwrap();
        assert!(!d.contains(&ArgValue::Int(0)));
        assert!(d.contains(&ArgValue::Int(-1)));
    }

    #[test]
    fn test_string_domains() {
        let d = resolve("alpha_string(4)", &ParamType::String).unwrap();
        assert!(d.contains(&ArgValue::Str("abcd".into())));
        assert!(!d.contains(&ArgValue::Str("abcde".into())));
        assert!(!d.contains(&ArgValue::Str("ab1".into())));
        assert!(resolve("alpha_string", &ParamType::Scalar(ScalarType::I32)).is_err());
        assert!(resolve("shouting_string", &ParamType::String).is_err());
    }

    #[test]
    fn test_element_of() {
        let d = resolve(r#"element_of("red", "green")"#, &ParamType::String).unwrap();
        assert!(d.contains(&ArgValue::Str("green".into())));
        assert!(!d.contains(&ArgValue::Str("blue".into())));
    }

    #[test]
    fn test_bool_accepts_only_arbitrary() {
        let ty = ParamType::Scalar(ScalarType::Bool);
        assert_eq!(resolve("arbitrary", &ty).unwrap(), ResolvedDomain::Bool);
        assert!(resolve("positive", &ty).is_err());
    }

    #[test]
    fn test_parse_literals() {
        let i32_ty = ParamType::Scalar(ScalarType::I32);
        assert_eq!(parse_literal("-12", &i32_ty).unwrap(), ArgValue::Int(-12));
        assert_eq!(parse_literal("0x10", &i32_ty).unwrap(), ArgValue::Int(16));
        assert!(parse_literal("3000000000", &i32_ty).is_err());
        assert_eq!(
            parse_literal(r#""al\"pha""#, &ParamType::String).unwrap(),
            ArgValue::Str("al\"pha".into())
        );
        assert_eq!(
            parse_literal("beta", &ParamType::String).unwrap(),
            ArgValue::Str("beta".into())
        );
        assert_eq!(
            parse_literal(r#""hi""#, &ParamType::ByteSpan).unwrap(),
            ArgValue::Bytes(b"hi".to_vec())
        );
        assert_eq!(
            parse_literal("2.5f", &ParamType::Scalar(ScalarType::F64)).unwrap(),
            ArgValue::Float(2.5)
        );
    }
}
