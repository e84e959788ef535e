//! Error types for building, evaluating, decoding and validating policy models.

use thiserror::Error;

use crate::model::Id;

/// Error taxonomy shared by builder and value operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// B001: Target shape rejects the requested operation
    ShapeMismatch,
    /// B002: Assigned value is outside the scalar kinds
    UnsupportedValueKind,
    /// B003: Closed context does not recognize a field name
    NoSuchProperty,
    /// B004: List index is not an integer
    InvalidIndexType,
    /// B005: List index outside `0..=len`
    IndexOutOfRange,
    /// V001: Map or object lookup miss with no default
    NoSuchKey,
    /// V002: Operation not defined for the operand types
    NoSuchOverload,
    /// V003: List read outside `0..len`
    IndexOutOfBounds,
    /// V004: Type or native conversion not defined
    UnsupportedConversion,
    /// V005: Feature boundary, deliberately unsupported
    NotImplemented,
    /// V006: Value node was never populated
    UnsetValue,
}

impl ErrorKind {
    /// Returns the error code string (e.g., "B001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ShapeMismatch => "B001",
            ErrorKind::UnsupportedValueKind => "B002",
            ErrorKind::NoSuchProperty => "B003",
            ErrorKind::InvalidIndexType => "B004",
            ErrorKind::IndexOutOfRange => "B005",
            ErrorKind::NoSuchKey => "V001",
            ErrorKind::NoSuchOverload => "V002",
            ErrorKind::IndexOutOfBounds => "V003",
            ErrorKind::UnsupportedConversion => "V004",
            ErrorKind::NotImplemented => "V005",
            ErrorKind::UnsetValue => "V006",
        }
    }
}

/// Error reported by a builder to the document decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("[B001] type not assignable to target: target={target}, type={shape}")]
    ShapeMismatch {
        target: &'static str,
        shape: &'static str,
    },

    #[error("[B002] value not assignable to target: target={target}, kind={kind}")]
    UnsupportedValueKind { target: &'static str, kind: String },

    #[error("[B003] no such property: type={target}, property={property}")]
    NoSuchProperty {
        target: &'static str,
        property: String,
    },

    #[error("[B004] invalid index type: index-type={expected}, argument={found}")]
    InvalidIndexType {
        expected: &'static str,
        found: String,
    },

    #[error("[B005] index out of range: index={index}, len={len}")]
    IndexOutOfRange { index: i128, len: usize },
}

impl BuildError {
    /// Returns the taxonomy entry for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            BuildError::UnsupportedValueKind { .. } => ErrorKind::UnsupportedValueKind,
            BuildError::NoSuchProperty { .. } => ErrorKind::NoSuchProperty,
            BuildError::InvalidIndexType { .. } => ErrorKind::InvalidIndexType,
            BuildError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
        }
    }
}

/// Error produced by a value operation.
///
/// These travel inside [`Val::Err`](crate::model::Val::Err) so that an expression engine can
/// propagate them like any other value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("[V001] no such key: {key}")]
    NoSuchKey { key: String },

    #[error("[V001] no such field: type={type_name}, field={field}")]
    NoSuchField { type_name: String, field: String },

    #[error("[V001] no default for object path: {path}")]
    NoDefault { path: String },

    #[error("[V002] no such overload: {op}({operands})")]
    NoSuchOverload { op: &'static str, operands: String },

    #[error("[V003] index out of bounds: index={index}, len={len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("[V002] unsupported index: {found}")]
    UnsupportedIndex { found: String },

    #[error("[V004] type conversion error from '{from}' to '{to}'")]
    UnsupportedConversion { from: String, to: String },

    #[error("[V004] value {value} out of range for '{to}'")]
    RangeError { value: String, to: &'static str },

    #[error("[V004] invalid timestamp: {message}")]
    InvalidTimestamp { message: String },

    #[error("[V005] {feature} not yet supported")]
    NotImplemented { feature: &'static str },

    #[error("[V006] value for source id {id} was never set")]
    UnsetValue { id: Id },
}

impl ValueError {
    /// Returns the taxonomy entry for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValueError::NoSuchKey { .. }
            | ValueError::NoSuchField { .. }
            | ValueError::NoDefault { .. } => ErrorKind::NoSuchKey,
            ValueError::NoSuchOverload { .. } | ValueError::UnsupportedIndex { .. } => {
                ErrorKind::NoSuchOverload
            }
            ValueError::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            ValueError::UnsupportedConversion { .. }
            | ValueError::RangeError { .. }
            | ValueError::InvalidTimestamp { .. } => ErrorKind::UnsupportedConversion,
            ValueError::NotImplemented { .. } => ErrorKind::NotImplemented,
            ValueError::UnsetValue { .. } => ErrorKind::UnsetValue,
        }
    }

    pub(crate) fn no_such_overload(op: &'static str, operands: &[&str]) -> Self {
        ValueError::NoSuchOverload {
            op,
            operands: operands.join(", "),
        }
    }
}

/// Error while decoding a YAML document into the model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("syntax error: {message}")]
    Syntax {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("nesting depth exceeds maximum {max} at '{path}'")]
    DepthExceeded { path: String, max: usize },

    #[error("unsupported {found} mapping key at '{path}'")]
    UnsupportedKey { path: String, found: &'static str },

    #[error("invalid scalar at '{path}': {message}")]
    InvalidScalar { path: String, message: String },

    #[error("at '{path}': {source}")]
    Build {
        path: String,
        #[source]
        source: BuildError,
    },
}

impl DecodeError {
    /// Returns the builder error taxonomy entry, when the failure came from a builder.
    pub fn build_kind(&self) -> Option<ErrorKind> {
        match self {
            DecodeError::Build { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for DecodeError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err.location();
        DecodeError::Syntax {
            message: err.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    }
}

/// Error during semantic validation of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{field}' (id {id})")]
    MissingField { id: Id, field: &'static str },

    #[error("field '{field}' has type {found}, expected {expected} (id {id})")]
    TypeMismatch {
        id: Id,
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("field '{field}' is not declared on type {type_name} (id {id})")]
    UndeclaredField {
        id: Id,
        type_name: String,
        field: String,
    },

    #[error("metadata must declare a 'name' or 'uid' (id {id})")]
    MissingName { id: Id },

    #[error("unsupported match operator '{operator}', expected In, NotIn or Exists (id {id})")]
    UnknownOperator { id: Id, operator: String },

    #[error("operator {operator} requires at least one value (id {id})")]
    MissingValues { id: Id, operator: &'static str },

    #[error("operator Exists does not accept values (id {id})")]
    UnexpectedValues { id: Id },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_codes() {
        let err = BuildError::ShapeMismatch {
            target: "list",
            shape: "struct",
        };
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert!(err.to_string().starts_with("[B001]"));

        let err = BuildError::IndexOutOfRange { index: -1, len: 0 };
        assert_eq!(err.kind().code(), "B005");
    }

    #[test]
    fn test_value_error_classes() {
        let err = ValueError::NoDefault {
            path: "T.count".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NoSuchKey);
        assert_eq!(err.to_string(), "[V001] no default for object path: T.count");

        let err = ValueError::no_such_overload("equal", &["string", "int"]);
        assert_eq!(err.to_string(), "[V002] no such overload: equal(string, int)");
    }

    #[test]
    fn test_decode_error_wraps_build_error() {
        let err = DecodeError::Build {
            path: "selector.bogus".to_string(),
            source: BuildError::NoSuchProperty {
                target: "selector",
                property: "bogus".to_string(),
            },
        };
        assert_eq!(err.build_kind(), Some(ErrorKind::NoSuchProperty));
        assert!(err.to_string().contains("selector.bogus"));
    }
}
