//! Error taxonomy of an invocation

use procall_core::{ProcallError, SqlType};
use thiserror::Error;

/// A failure that aborts one stored procedure invocation
#[derive(Error, Debug)]
pub enum InvokeError {
    /// An attribute key or type code could not be understood
    #[error("Malformed parameter attribute '{key}': {reason}")]
    MalformedParameter { key: String, reason: String },

    /// A value could not be converted to its declared type
    #[error("Cannot parse parameter {index} value '{value}' as {sql_type}: {reason}")]
    Parse {
        index: u32,
        sql_type: SqlType,
        value: String,
        reason: String,
    },

    /// A numeric value does not fit its declared type
    #[error("Parameter {index} value '{value}' is out of range for {sql_type}")]
    NumericRange {
        index: u32,
        sql_type: SqlType,
        value: String,
    },

    /// A format token is not understood for the declared type
    #[error("Unsupported format '{format}' for parameter {index} of type {sql_type}")]
    UnsupportedFormat {
        index: u32,
        sql_type: SqlType,
        format: String,
    },

    /// The call failed while binding, executing or cleaning up
    #[error("Execution failed: {0}")]
    Execution(#[source] ProcallError),

    /// Draining the results into the document failed
    #[error("Serialization failed: {0}")]
    Serialization(#[source] ProcallError),

    /// No usable statement or an invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The pool could not lend a connection
    #[error("Connection unavailable: {0}")]
    Connection(#[source] ProcallError),
}

impl InvokeError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        InvokeError::MalformedParameter {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure happened before the routine was executed
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            InvokeError::MalformedParameter { .. }
                | InvokeError::Parse { .. }
                | InvokeError::NumericRange { .. }
                | InvokeError::UnsupportedFormat { .. }
                | InvokeError::Configuration(_)
                | InvokeError::Connection(_)
        )
    }
}

/// Result type alias for invocation operations
pub type Result<T> = std::result::Result<T, InvokeError>;
