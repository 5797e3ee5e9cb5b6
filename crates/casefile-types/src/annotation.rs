//! Declaration metadata as handed over by the external scanner.
//!
//! An [`Annotation`] is a tag name plus an ordered argument list. Arguments
//! are raw source tokens; interpretation belongs to the metadata model in
//! `casefile-core`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One annotation argument, positional or `name = value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawArg", into = "RawArg")]
pub struct AnnotationArg {
    pub name: Option<String>,
    pub value: String,
}

impl AnnotationArg {
    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

impl fmt::Display for AnnotationArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} = \"{}\"", name, self.value),
            None => write!(f, "\"{}\"", self.value),
        }
    }
}

/// Manifest encoding: a bare string is positional, an object is named.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawArg {
    Positional(String),
    Named { name: String, value: String },
}

impl From<RawArg> for AnnotationArg {
    fn from(raw: RawArg) -> Self {
        match raw {
            RawArg::Positional(value) => AnnotationArg::positional(value),
            RawArg::Named { name, value } => AnnotationArg::named(name, value),
        }
    }
}

impl From<AnnotationArg> for RawArg {
    fn from(arg: AnnotationArg) -> Self {
        match arg.name {
            Some(name) => RawArg::Named {
                name,
                value: arg.value,
            },
            None => RawArg::Positional(arg.value),
        }
    }
}

/// A single parsed annotation. Immutable once produced by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub tag: String,
    #[serde(default)]
    pub args: Vec<AnnotationArg>,
}

impl Annotation {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            args: Vec::new(),
        }
    }

    /// Builder helper: append a positional argument.
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(AnnotationArg::positional(value));
        self
    }

    /// Builder helper: append a named argument.
    pub fn named(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(AnnotationArg::named(name, value));
        self
    }

    /// Builder helper: append several positional arguments.
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(values.into_iter().map(AnnotationArg::positional));
        self
    }

    pub fn positional(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .filter(|a| !a.is_named())
            .map(|a| a.value.as_str())
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.tag)?;
        for (idx, arg) in self.args.iter().enumerate() {
            if idx != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_arg_forms() {
        let json = r#"{"tag":"fixture","args":["db",{"name":"lifetime","value":"suite"}]}"#;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.tag, "fixture");
        assert_eq!(ann.args[0], AnnotationArg::positional("db"));
        assert_eq!(ann.args[1], AnnotationArg::named("lifetime", "suite"));

        let back = serde_json::to_string(&ann).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_missing_args_defaults_to_empty() {
        let ann: Annotation = serde_json::from_str(r#"{"tag":"skip"}"#).unwrap();
        assert!(ann.args.is_empty());
    }

    #[test]
    fn test_display() {
        let ann = Annotation::new("seed").arg("1").arg("alpha");
        assert_eq!(ann.to_string(), "seed(\"1\", \"alpha\")");
    }
}
