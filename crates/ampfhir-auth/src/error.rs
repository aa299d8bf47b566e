//! Authentication and authorization error types.
//!
//! Access denial is not an error: a well-formed caller lacking reachability
//! gets an [`AccessDecision::Deny`](crate::policy::AccessDecision::Deny).
//! The variants here are failures the dispatch layer must surface as such.

use std::fmt;

use ampfhir_storage::StorageError;

/// Failures of the authorization pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing, malformed or unverifiable credentials, or credentials whose
    /// organization roles resolve to no known organization.
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// The record repository failed. Never down-converted to a denial.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The decision did not complete within the configured timeout.
    #[error("Authorization decision timed out after {elapsed_ms} ms")]
    Timeout {
        /// Configured limit that elapsed, in milliseconds.
        elapsed_ms: u128,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The request cannot be authorized as given.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

impl AuthError {
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// The caller can fix the request; the server is not at fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated { .. } | Self::InvalidRequest { .. }
        )
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// Category used in log fields.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated { .. } => ErrorCategory::Authentication,
            Self::Storage(_) => ErrorCategory::Infrastructure,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
        }
    }

    /// HTTP status the dispatch layer should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthenticated { .. } => 401,
            Self::InvalidRequest { .. } => 400,
            Self::Timeout { .. } => 504,
            Self::Storage(_) | Self::Configuration { .. } => 500,
        }
    }
}

/// Coarse classification of [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authentication,
    Validation,
    /// Repository failures.
    Infrastructure,
    Timeout,
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::Infrastructure => "infrastructure",
            Self::Timeout => "timeout",
            Self::Configuration => "configuration",
        })
    }
}
