//! Error types for the deprecation toolkit.

use thiserror::Error;

/// Errors raised by warning-class validation, message rendering, and the
/// migration wrappers.
#[derive(Error, Debug, Clone)]
pub enum DeprecationError {
    /// A warning class, message template, or declaration is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A declared signature cannot support keyword-argument migration.
    #[error("signature shape error: {0}")]
    Shape(String),

    /// A kind name outside the supported taxonomy.
    #[error("incompatible warning kind: {given:?} (expected \"imminent\" or \"pending\")")]
    IncompatibleKind { given: String },

    /// An operation arrived while the target was in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An operation the wrapped value cannot support.
    #[error("unsupported operation `{op}`: {detail}")]
    UnsupportedOperation { op: &'static str, detail: String },
}

impl DeprecationError {
    /// Short stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            DeprecationError::Configuration(_) => "configuration",
            DeprecationError::Shape(_) => "shape",
            DeprecationError::IncompatibleKind { .. } => "incompatible_kind",
            DeprecationError::InvalidState(_) => "invalid_state",
            DeprecationError::UnsupportedOperation { .. } => "unsupported_operation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeprecationError::Configuration("product cannot be empty".to_string());
        assert_eq!(err.to_string(), "configuration error: product cannot be empty");

        let err = DeprecationError::IncompatibleKind {
            given: "someday".to_string(),
        };
        assert!(err.to_string().contains("\"someday\""));
        assert!(err.to_string().contains("imminent"));
    }

    #[test]
    fn test_error_labels() {
        assert_eq!(
            DeprecationError::Shape("no keyword-only params".to_string()).label(),
            "shape"
        );
        assert_eq!(
            DeprecationError::UnsupportedOperation {
                op: "iterate",
                detail: "not a collection".to_string(),
            }
            .label(),
            "unsupported_operation"
        );
    }
}
