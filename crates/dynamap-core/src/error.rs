//! Error taxonomy for marshalling and expression compilation.
//!
//! Every error here signals a programming or data error; none is transient
//! and none is retried.

/// Errors raised by the schema registry, marshaller and compilers.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// A value matched none of the declared candidate types.
    #[error("Expected {path} to be of type {expected}, instead found type {actual}.")]
    TypeMismatch {
        /// Dotted attribute path.
        path: String,
        /// Comma-separated names of the declared candidate types.
        expected: String,
        /// Name of the type that was encountered.
        actual: String,
    },

    /// A required, enum or custom validation rule failed.
    #[error("{message}")]
    Validation {
        /// Explanation, naming the attribute path.
        message: String,
    },

    /// The schema, builder or update object was malformed.
    #[error("{message}")]
    InvalidParameter {
        /// Explanation.
        message: String,
    },

    /// A builder referenced an attribute the schema does not declare.
    #[error("Unknown attribute: {path}")]
    UnknownAttribute {
        /// Dotted attribute path.
        path: String,
    },

    /// A `set`, `get` or `default` hook returned an error.
    #[error("hook for {path} failed: {source}")]
    Hook {
        /// Dotted attribute path.
        path: String,
        /// The hook's error.
        #[source]
        source: anyhow::Error,
    },
}

impl MapperError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn unknown(path: impl Into<String>) -> Self {
        Self::UnknownAttribute { path: path.into() }
    }
}

/// Convenience result type for dynamap operations.
pub type MapperResult<T> = Result<T, MapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_format_type_mismatch() {
        let err = MapperError::TypeMismatch {
            path: "age".to_owned(),
            expected: "number".to_owned(),
            actual: "string".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Expected age to be of type number, instead found type string."
        );
    }

    #[test]
    fn test_should_expose_hook_source() {
        let err = MapperError::Hook {
            path: "name".to_owned(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "hook for name failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
