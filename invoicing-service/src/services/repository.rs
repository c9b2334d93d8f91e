//! Persistence interfaces consumed by the invoicing services.
//!
//! Every read is scoped to the owning user and skips soft-deleted rows.
//! Uniqueness violations surface as [`AppError::Conflict`].

use crate::models::{
    Contractor, Invoice, InvoiceItem, InvoiceStatus, ListContractorsQuery, ListInvoicesQuery,
    NewInvoiceItem, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError>;

    /// Insert the full item set of an invoice as one unit.
    async fn insert_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, AppError>;

    /// Physically remove an invoice and its items. Only used to compensate a
    /// create whose items could not be stored.
    async fn purge_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError>;

    async fn get_invoice(&self, user_id: Uuid, invoice_id: Uuid)
        -> Result<Option<Invoice>, AppError>;

    /// Items ordered by position.
    async fn get_items(&self, user_id: Uuid, invoice_id: Uuid)
        -> Result<Vec<InvoiceItem>, AppError>;

    /// One page of invoices plus the total number of matches.
    async fn list_invoices(
        &self,
        user_id: Uuid,
        query: &ListInvoicesQuery,
    ) -> Result<(Vec<Invoice>, u64), AppError>;

    async fn invoice_number_exists(
        &self,
        user_id: Uuid,
        invoice_number: &str,
        exclude_invoice_id: Option<Uuid>,
    ) -> Result<bool, AppError>;

    /// Overwrite the mutable columns of a live invoice.
    async fn update_invoice(&self, invoice: &Invoice) -> Result<Option<Invoice>, AppError>;

    async fn delete_items(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError>;

    async fn update_status(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, AppError>;

    /// Returns `false` when no live invoice matched.
    async fn soft_delete_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;

    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError>;

    /// Overwrite seller and numbering fields. Never touches the counter.
    async fn update_profile(&self, profile: &UserProfile) -> Result<Option<UserProfile>, AppError>;

    /// Atomically bump the numbering counter and return the new value.
    async fn increment_invoice_counter(&self, user_id: Uuid) -> Result<i64, AppError>;
}

#[async_trait]
pub trait ContractorRepository: Send + Sync {
    async fn insert_contractor(&self, contractor: &Contractor) -> Result<Contractor, AppError>;

    async fn get_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
    ) -> Result<Option<Contractor>, AppError>;

    async fn list_contractors(
        &self,
        user_id: Uuid,
        query: &ListContractorsQuery,
    ) -> Result<(Vec<Contractor>, u64), AppError>;

    async fn nip_exists(
        &self,
        user_id: Uuid,
        nip: &str,
        exclude_contractor_id: Option<Uuid>,
    ) -> Result<bool, AppError>;

    async fn update_contractor(&self, contractor: &Contractor)
        -> Result<Option<Contractor>, AppError>;

    async fn soft_delete_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
}

/// Liveness of the backing store, reported on `/health` and `/ready`.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;
}
