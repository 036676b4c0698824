//! Observability error type

/// Errors raised while setting up logging
#[derive(Debug, thiserror::Error, Clone)]
pub enum ObservabilityError {
    /// Filter or subscriber failure
    #[error("Logging error: {message}")]
    Logging {
        /// Detail
        message: String,
    },

    /// A global subscriber was already installed
    #[error("Initialization error: {message}")]
    Init {
        /// Detail
        message: String,
    },
}

impl ObservabilityError {
    /// Create a logging error
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Create an initialization error
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, ObservabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ObservabilityError::logging("Invalid directive");
        assert!(matches!(err, ObservabilityError::Logging { .. }));
        assert_eq!(err.to_string(), "Logging error: Invalid directive");
    }
}
