//! Failure values returned by the analysis validator.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Why raw model output was rejected.
///
/// Both variants are expected outcomes of talking to a generative model and
/// are returned as ordinary `Err` values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    /// The text is not a single JSON value.
    #[error("malformed JSON at line {line}, column {column}: {message}")]
    MalformedJson {
        message: String,
        line: usize,
        column: usize,
    },

    /// The JSON parsed but does not fit the analysis schema. Violations are
    /// listed in the order the walk met them.
    #[error("{} schema violation(s): {}", .0.len(), join_violations(.0))]
    SchemaViolation(Vec<Violation>),
}

/// Discriminant of [`ValidationFailure`], for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedJson,
    SchemaViolation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedJson => "malformed_json",
            Self::SchemaViolation => "schema_violation",
        }
    }
}

impl ValidationFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedJson { .. } => FailureKind::MalformedJson,
            Self::SchemaViolation(_) => FailureKind::SchemaViolation,
        }
    }

    /// The collected violations; empty for [`ValidationFailure::MalformedJson`].
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::MalformedJson { .. } => &[],
            Self::SchemaViolation(v) => v,
        }
    }

    /// Field paths of all violations, in order.
    pub fn paths(&self) -> Vec<&str> {
        self.violations().iter().map(|v| v.path.as_str()).collect()
    }
}

impl From<serde_json::Error> for ValidationFailure {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One deviation of the input from the schema, addressed by field path
/// (`actions[2].due_date`). The root object itself is addressed as `$`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Required key absent.
    Missing,
    WrongType { expected: JsonType, found: JsonType },
    NotInEnumeration {
        value: String,
        allowed: &'static [&'static str],
    },
    OutOfRange { value: f64, min: f64, max: f64 },
    /// String does not look like `YYYY-MM-DD`.
    DatePattern { value: String },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("required field is missing"),
            Self::WrongType { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Self::NotInEnumeration { value, allowed } => {
                write!(f, "{value:?} is not one of {}", allowed.join(" | "))
            }
            Self::OutOfRange { value, min, max } => {
                write!(f, "{value} is outside [{min}, {max}]")
            }
            Self::DatePattern { value } => {
                write!(f, "{value:?} does not match YYYY-MM-DD")
            }
        }
    }
}

/// JSON value shapes as named in violation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    Integer,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
