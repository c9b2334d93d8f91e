//! Caller-facing errors for invoicing operations.

use crate::models::InvoiceStatus;
use chrono::NaiveDate;
use service_core::error::AppError;
use thiserror::Error;

/// Coarse category a caller branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    PreconditionFailed,
    Unauthorized,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum InvoicingError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Due date {due_date} is before issue date {issue_date}")]
    InvalidDates {
        issue_date: NaiveDate,
        due_date: NaiveDate,
    },

    #[error("Invoice number '{0}' already exists")]
    NumberExists(String),

    #[error("Contractor with NIP '{0}' already exists")]
    NipExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Company profile is incomplete (missing: {})", .missing.join(", "))]
    IncompleteProfile { missing: Vec<&'static str> },

    #[error("Cannot change invoice status from {from} to {to}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Persistence or infrastructure failure. The cause is kept as the error
    /// source for logging and never rendered to callers.
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl InvoicingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoicingError::NotFound(_) => ErrorKind::NotFound,
            InvoicingError::Validation(_) | InvoicingError::InvalidDates { .. } => {
                ErrorKind::Validation
            }
            InvoicingError::NumberExists(_)
            | InvoicingError::NipExists(_)
            | InvoicingError::Conflict(_) => ErrorKind::Conflict,
            InvoicingError::IncompleteProfile { .. } | InvoicingError::InvalidTransition { .. } => {
                ErrorKind::PreconditionFailed
            }
            InvoicingError::Unauthorized(_) => ErrorKind::Unauthorized,
            InvoicingError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        InvoicingError::Validation(message.into())
    }
}

impl From<AppError> for InvoicingError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(_) => InvoicingError::NotFound("Resource"),
            AppError::Conflict(e) => InvoicingError::Conflict(e.to_string()),
            AppError::BadRequest(e) => InvoicingError::Validation(e.to_string()),
            AppError::Unauthorized(e) => InvoicingError::Unauthorized(e.to_string()),
            other => {
                tracing::error!(error = ?other, "Internal failure in invoicing operation");
                InvoicingError::Internal(anyhow::Error::new(other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_become_opaque_internal_errors() {
        let err: InvoicingError =
            AppError::DatabaseError(anyhow::anyhow!("relation \"invoices\" does not exist"))
                .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.to_string(), "Internal error");
    }

    #[test]
    fn persistence_conflicts_keep_their_kind() {
        let err: InvoicingError = AppError::Conflict(anyhow::anyhow!("duplicate")).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn transition_errors_are_precondition_failures() {
        let err = InvoicingError::InvalidTransition {
            from: InvoiceStatus::Paid,
            to: InvoiceStatus::Draft,
        };
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(
            err.to_string(),
            "Cannot change invoice status from paid to draft"
        );
    }

    #[test]
    fn incomplete_profile_lists_missing_fields() {
        let err = InvoicingError::IncompleteProfile {
            missing: vec!["address", "nip"],
        };
        assert_eq!(
            err.to_string(),
            "Company profile is incomplete (missing: address, nip)"
        );
    }
}
