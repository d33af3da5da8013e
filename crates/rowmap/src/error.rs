//! Errors

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while describing, generating, executing or materializing.
#[derive(Error, Debug)]
pub enum Error {
    /// The mapped shape of an entity does not support the requested operation.
    /// Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single value could not be converted between its stored and attribute
    /// representations.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The execution layer failed. The backend's error is kept unchanged so
    /// callers can downcast to driver diagnostics.
    #[error(transparent)]
    Execution(anyhow::Error),
}

// Backends report value conversion failures as a wrapped `Error`; those keep
// their variant instead of becoming execution errors.
impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(inner) => inner,
            Err(error) => Self::Execution(error),
        }
    }
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    /// Attach the column a conversion failure relates to.
    #[must_use]
    pub fn in_column(self, column: &str) -> Self {
        match self {
            Self::Conversion(message) => Self::Conversion(format!("column '{column}': {message}")),
            other => other,
        }
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns `true` for conversion errors.
    #[must_use]
    pub const fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_gains_column() {
        let err = Error::conversion("expected int32").in_column("orders.total");
        assert_eq!(err.to_string(), "conversion error: column 'orders.total': expected int32");
    }

    #[test]
    fn execution_is_transparent() {
        let err = Error::from(anyhow::anyhow!("UNIQUE constraint failed: users.email"));
        assert_eq!(err.to_string(), "UNIQUE constraint failed: users.email");
        assert!(!err.is_config());
    }

    #[test]
    fn wrapped_errors_keep_their_variant() {
        let err = Error::from(anyhow::Error::new(Error::conversion("value out of range")));
        assert!(err.is_conversion());
        assert_eq!(err.to_string(), "conversion error: value out of range");
    }
}
