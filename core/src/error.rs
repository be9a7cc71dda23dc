use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum QuarryError {
    /// Invalid schema or relation registration
    #[error("Schema error: {0}")]
    Schema(String),

    /// A model name that was never registered
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// An include alias that resolves to no relation (strict include mode)
    #[error("Unknown relation `{alias}` on model {model}")]
    UnknownRelation { model: String, alias: String },

    /// Malformed query descriptor
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A value could not be converted for its attribute
    #[error("Cannot coerce `{attribute}`: {message}")]
    Coercion { attribute: String, message: String },

    /// Error reported by the connection while running a statement
    #[error("{message}")]
    Driver {
        message: String,
        code: Option<String>,
    },

    /// Error decoding a result row
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuarryError {
    /// Builds a driver error from a message alone.
    pub fn driver(message: impl Into<String>) -> Self {
        QuarryError::Driver {
            message: message.into(),
            code: None,
        }
    }

    /// Builds a driver error carrying a SQLSTATE or driver error code.
    pub fn driver_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        QuarryError::Driver {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub(crate) fn coercion(attribute: &str, message: impl Into<String>) -> Self {
        QuarryError::Coercion {
            attribute: attribute.to_string(),
            message: message.into(),
        }
    }

    /// Returns `true` when this is a driver error matching one of the
    /// transient lock signatures (case-insensitive substring of the message)
    /// or one of the transient error codes.
    pub fn is_transient<S, C>(&self, signatures: &[S], codes: &[C]) -> bool
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        let QuarryError::Driver { message, code } = self else {
            return false;
        };

        if let Some(code) = code
            && codes.iter().any(|c| c.as_ref() == code)
        {
            return true;
        }

        let lower = message.to_ascii_lowercase();
        signatures
            .iter()
            .any(|s| lower.contains(&s.as_ref().to_ascii_lowercase()))
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, QuarryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlock_message_is_transient() {
        let err = QuarryError::driver("ER_LOCK_DEADLOCK: Deadlock found when trying to get lock");
        assert!(err.is_transient(&["deadlock"], &[] as &[&str]));
        assert!(!err.is_transient(&["lock wait timeout"], &[] as &[&str]));
    }

    #[test]
    fn sqlstate_code_is_transient() {
        let err = QuarryError::driver_with_code("could not serialize access", "40001");
        assert!(err.is_transient(&[] as &[&str], &["40P01", "40001"]));
    }

    #[test]
    fn non_driver_errors_are_never_transient() {
        let err = QuarryError::InvalidQuery("deadlock".into());
        assert!(!err.is_transient(&["deadlock"], &["40P01"]));
    }

    #[test]
    fn driver_error_displays_message_unchanged() {
        let err = QuarryError::driver("error finding users.");
        assert_eq!(err.to_string(), "error finding users.");
    }
}
