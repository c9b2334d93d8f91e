//! Services module for invoicing-service.

pub mod clock;
pub mod contractors;
pub mod database;
pub mod identity;
pub mod invoices;
pub mod memory;
pub mod metrics;
pub mod money;
pub mod numbering;
pub mod profiles;
pub mod repository;
pub mod status;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use contractors::ContractorService;
pub use database::Database;
pub use identity::{Identity, IdentityProvider, JwtIdentityProvider, DEFAULT_AUDIENCE};
pub use invoices::InvoiceService;
pub use memory::InMemoryDatabase;
pub use metrics::{get_metrics, init_metrics};
pub use profiles::ProfileService;
pub use repository::{ContractorRepository, HealthCheck, InvoiceRepository, ProfileRepository};

use crate::error::{ErrorKind, InvoicingError};
use tracing::warn;

/// Count and log the outcome of a public service operation.
pub(crate) fn observe<T>(
    operation: &'static str,
    result: Result<T, InvoicingError>,
) -> Result<T, InvoicingError> {
    metrics::record_outcome(operation, &result);
    if let Err(e) = &result {
        // Internal failures were already logged with full detail.
        if e.kind() != ErrorKind::Internal {
            warn!(operation, error = %e, kind = e.kind().as_str(), "Operation rejected");
        }
    }
    result
}
