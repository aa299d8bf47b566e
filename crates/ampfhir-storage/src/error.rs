//! Repository errors.
//!
//! A missing record is not an error for [`read`](crate::RecordRepository::read),
//! which answers `None`. `NotFound` is only raised by callers that require
//! the record to exist.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Record not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// The record could not be interpreted (bad JSON shape or record type).
    #[error("Invalid record: {message}")]
    InvalidResource { message: String },

    /// No reference index exists for `resource_type.param`.
    #[error("Search parameter {resource_type}.{param} is not indexed")]
    UnsupportedSearchParam { resource_type: String, param: String },

    #[error("Repository unreachable: {message}")]
    ConnectionError { message: String },

    #[error("Repository call timed out: {message}")]
    Timeout { message: String },

    #[error("Repository failure: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported_search_param(
        resource_type: impl Into<String>,
        param: impl Into<String>,
    ) -> Self {
        Self::UnsupportedSearchParam {
            resource_type: resource_type.into(),
            param: param.into(),
        }
    }

    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Category used in log fields.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidResource { .. } | Self::UnsupportedSearchParam { .. } => {
                ErrorCategory::Validation
            }
            Self::ConnectionError { .. } | Self::Timeout { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Coarse classification of [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Infrastructure,
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Infrastructure => "infrastructure",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
