//! Invoice status transitions.
//!
//! ```text
//! draft  -> unpaid, paid
//! unpaid -> paid, draft
//! paid   -> unpaid
//! ```
//!
//! Entering any non-draft status requires a complete seller profile.

use crate::error::InvoicingError;
use crate::models::{InvoiceStatus, UserProfile};

/// Result of a permitted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one; nothing to persist.
    Unchanged,
    Changed {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
}

impl InvoiceStatus {
    /// Statuses reachable from `self` in one step.
    pub fn allowed_transitions(&self) -> &'static [InvoiceStatus] {
        match self {
            InvoiceStatus::Draft => &[InvoiceStatus::Unpaid, InvoiceStatus::Paid],
            InvoiceStatus::Unpaid => &[InvoiceStatus::Paid, InvoiceStatus::Draft],
            InvoiceStatus::Paid => &[InvoiceStatus::Unpaid],
        }
    }

    /// Whether invoices in this status must carry complete seller data.
    pub fn requires_complete_profile(&self) -> bool {
        *self != InvoiceStatus::Draft
    }
}

/// Validate the edge `from -> to` against the transition table.
pub fn check_transition(from: InvoiceStatus, to: InvoiceStatus) -> Result<Transition, InvoicingError> {
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if from.allowed_transitions().contains(&to) {
        Ok(Transition::Changed { from, to })
    } else {
        Err(InvoicingError::InvalidTransition { from, to })
    }
}

/// Fail unless the seller fields required for issuing are filled in.
pub fn ensure_profile_complete(profile: &UserProfile) -> Result<(), InvoicingError> {
    let missing = profile.missing_seller_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InvoicingError::IncompleteProfile { missing })
    }
}
