//! In-process store implementing the repository traits.
//!
//! Mirrors the PostgreSQL schema's constraints (per-user unique live invoice
//! numbers and contractor NIPs, unique item positions) so services behave the
//! same against either backend. Used by tests and local runs.

use crate::models::{
    normalize_paging, Contractor, Invoice, InvoiceItem, InvoiceSortField, InvoiceStatus,
    ListContractorsQuery, ListInvoicesQuery, NewInvoiceItem, SortOrder, UserProfile,
};
use crate::services::repository::{
    ContractorRepository, HealthCheck, InvoiceRepository, ProfileRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    invoices: HashMap<Uuid, Invoice>,
    items: HashMap<Uuid, Vec<InvoiceItem>>,
    profiles: HashMap<Uuid, UserProfile>,
    contractors: HashMap<Uuid, Contractor>,
}

impl Tables {
    fn live_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Option<&Invoice> {
        self.invoices
            .get(&invoice_id)
            .filter(|i| i.user_id == user_id && i.deleted_at.is_none())
    }

    fn number_taken(&self, user_id: Uuid, number: &str, exclude: Option<Uuid>) -> bool {
        self.invoices.values().any(|i| {
            i.user_id == user_id
                && i.deleted_at.is_none()
                && i.invoice_number == number
                && Some(i.id) != exclude
        })
    }

    fn live_contractor(&self, user_id: Uuid, contractor_id: Uuid) -> Option<&Contractor> {
        self.contractors
            .get(&contractor_id)
            .filter(|c| c.user_id == user_id && c.deleted_at.is_none())
    }

    fn nip_taken(&self, user_id: Uuid, nip: &str, exclude: Option<Uuid>) -> bool {
        self.contractors.values().any(|c| {
            c.user_id == user_id
                && c.deleted_at.is_none()
                && c.nip.as_deref() == Some(nip)
                && Some(c.id) != exclude
        })
    }
}

/// Shared, cloneable in-memory database.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored invoice row regardless of owner or soft-delete state.
    pub async fn raw_invoice(&self, invoice_id: Uuid) -> Option<Invoice> {
        self.tables.read().await.invoices.get(&invoice_id).cloned()
    }

    /// Stored item rows regardless of the parent's soft-delete state.
    pub async fn raw_items(&self, invoice_id: Uuid) -> Vec<InvoiceItem> {
        self.tables
            .read()
            .await
            .items
            .get(&invoice_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn conflict(message: String) -> AppError {
    AppError::Conflict(anyhow::anyhow!(message))
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn compare_invoices(a: &Invoice, b: &Invoice, field: InvoiceSortField) -> Ordering {
    match field {
        InvoiceSortField::IssueDate => a.issue_date.cmp(&b.issue_date),
        InvoiceSortField::DueDate => a.due_date.cmp(&b.due_date),
        InvoiceSortField::InvoiceNumber => a.invoice_number.cmp(&b.invoice_number),
        InvoiceSortField::TotalGross => a.total_gross.cmp(&b.total_gross),
        InvoiceSortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

fn page_of<T: Clone>(rows: &[T], page: u32, limit: u32) -> Vec<T> {
    let (_, limit, offset) = normalize_paging(page, limit);
    rows.iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl HealthCheck for InMemoryDatabase {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryDatabase {
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError> {
        let mut tables = self.tables.write().await;
        if tables.number_taken(invoice.user_id, &invoice.invoice_number, None) {
            return Err(conflict(format!(
                "Invoice number '{}' already exists",
                invoice.invoice_number
            )));
        }
        tables.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice.clone())
    }

    async fn insert_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let mut tables = self.tables.write().await;
        let created_at = match tables.invoices.get(&invoice_id) {
            Some(invoice) if invoice.user_id == user_id => invoice.updated_at,
            _ => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Invoice {} does not exist",
                    invoice_id
                )))
            }
        };

        let existing = tables.items.get(&invoice_id).cloned().unwrap_or_default();
        let mut positions: HashSet<i32> = existing.iter().map(|i| i.position).collect();
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            if !positions.insert(item.position) {
                return Err(conflict(format!(
                    "Duplicate item position {} on invoice {}",
                    item.position, invoice_id
                )));
            }
            stored.push(InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                position: item.position,
                name: item.name.clone(),
                unit: item.unit_or_default(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                vat_rate: item.vat_rate,
                created_at,
            });
        }

        let entry = tables.items.entry(invoice_id).or_default();
        entry.extend(stored.iter().cloned());
        entry.sort_by_key(|i| i.position);
        stored.sort_by_key(|i| i.position);
        Ok(stored)
    }

    async fn purge_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .invoices
            .get(&invoice_id)
            .is_some_and(|i| i.user_id == user_id)
        {
            tables.invoices.remove(&invoice_id);
            tables.items.remove(&invoice_id);
        }
        Ok(())
    }

    async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.live_invoice(user_id, invoice_id).cloned())
    }

    async fn get_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let tables = self.tables.read().await;
        if tables.live_invoice(user_id, invoice_id).is_none() {
            return Ok(Vec::new());
        }
        Ok(tables.items.get(&invoice_id).cloned().unwrap_or_default())
    }

    async fn list_invoices(
        &self,
        user_id: Uuid,
        query: &ListInvoicesQuery,
    ) -> Result<(Vec<Invoice>, u64), AppError> {
        let tables = self.tables.read().await;
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|i| i.user_id == user_id && i.deleted_at.is_none())
            .filter(|i| query.status.map_or(true, |s| i.status == s))
            .filter(|i| query.contractor_id.map_or(true, |c| i.contractor_id == Some(c)))
            .filter(|i| query.issued_from.map_or(true, |d| i.issue_date >= d))
            .filter(|i| query.issued_to.map_or(true, |d| i.issue_date <= d))
            .filter(|i| {
                search.as_deref().map_or(true, |s| {
                    contains_ci(&i.invoice_number, s) || contains_ci(&i.buyer.name, s)
                })
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ord = compare_invoices(a, b, query.sort_by);
            let ord = match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then_with(|| a.id.cmp(&b.id))
        });

        let total = rows.len() as u64;
        Ok((page_of(&rows, query.page, query.limit), total))
    }

    async fn invoice_number_exists(
        &self,
        user_id: Uuid,
        invoice_number: &str,
        exclude_invoice_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.number_taken(user_id, invoice_number, exclude_invoice_id))
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<Option<Invoice>, AppError> {
        let mut tables = self.tables.write().await;
        if tables.live_invoice(invoice.user_id, invoice.id).is_none() {
            return Ok(None);
        }
        if tables.number_taken(invoice.user_id, &invoice.invoice_number, Some(invoice.id)) {
            return Err(conflict(format!(
                "Invoice number '{}' already exists",
                invoice.invoice_number
            )));
        }
        let Some(stored) = tables.invoices.get_mut(&invoice.id) else {
            return Ok(None);
        };
        // Ownership, status, creation time and deletion state are not
        // writable through this path.
        let updated = Invoice {
            user_id: stored.user_id,
            status: stored.status,
            created_at: stored.created_at,
            deleted_at: stored.deleted_at,
            ..invoice.clone()
        };
        *stored = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_items(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.live_invoice(user_id, invoice_id).is_some() {
            tables.items.remove(&invoice_id);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, AppError> {
        let mut tables = self.tables.write().await;
        if tables.live_invoice(user_id, invoice_id).is_none() {
            return Ok(None);
        }
        Ok(tables.invoices.get_mut(&invoice_id).map(|invoice| {
            invoice.status = status;
            invoice.updated_at = updated_at;
            invoice.clone()
        }))
    }

    async fn soft_delete_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.live_invoice(user_id, invoice_id).is_none() {
            return Ok(false);
        }
        if let Some(invoice) = tables.invoices.get_mut(&invoice_id) {
            invoice.deleted_at = Some(deleted_at);
            invoice.updated_at = deleted_at;
        }
        Ok(true)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryDatabase {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        let mut tables = self.tables.write().await;
        if tables.profiles.contains_key(&profile.user_id) {
            return Err(conflict(format!(
                "Profile for user {} already exists",
                profile.user_id
            )));
        }
        tables.profiles.insert(profile.user_id, profile.clone());
        Ok(profile.clone())
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<Option<UserProfile>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.profiles.get_mut(&profile.user_id).map(|stored| {
            *stored = UserProfile {
                invoice_number_counter: stored.invoice_number_counter,
                created_at: stored.created_at,
                ..profile.clone()
            };
            stored.clone()
        }))
    }

    async fn increment_invoice_counter(&self, user_id: Uuid) -> Result<i64, AppError> {
        let mut tables = self.tables.write().await;
        let profile = tables.profiles.get_mut(&user_id).ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Profile for user {} not found", user_id))
        })?;
        profile.invoice_number_counter += 1;
        Ok(profile.invoice_number_counter)
    }
}

#[async_trait]
impl ContractorRepository for InMemoryDatabase {
    async fn insert_contractor(&self, contractor: &Contractor) -> Result<Contractor, AppError> {
        let mut tables = self.tables.write().await;
        if let Some(nip) = contractor.nip.as_deref() {
            if tables.nip_taken(contractor.user_id, nip, None) {
                return Err(conflict(format!("Contractor NIP '{}' already exists", nip)));
            }
        }
        tables.contractors.insert(contractor.id, contractor.clone());
        Ok(contractor.clone())
    }

    async fn get_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
    ) -> Result<Option<Contractor>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.live_contractor(user_id, contractor_id).cloned())
    }

    async fn list_contractors(
        &self,
        user_id: Uuid,
        query: &ListContractorsQuery,
    ) -> Result<(Vec<Contractor>, u64), AppError> {
        let tables = self.tables.read().await;
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<Contractor> = tables
            .contractors
            .values()
            .filter(|c| c.user_id == user_id && c.deleted_at.is_none())
            .filter(|c| {
                search.as_deref().map_or(true, |s| {
                    contains_ci(&c.name, s) || c.nip.as_deref().is_some_and(|n| n.contains(s))
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let total = rows.len() as u64;
        Ok((page_of(&rows, query.page, query.limit), total))
    }

    async fn nip_exists(
        &self,
        user_id: Uuid,
        nip: &str,
        exclude_contractor_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.nip_taken(user_id, nip, exclude_contractor_id))
    }

    async fn update_contractor(
        &self,
        contractor: &Contractor,
    ) -> Result<Option<Contractor>, AppError> {
        let mut tables = self.tables.write().await;
        if tables.live_contractor(contractor.user_id, contractor.id).is_none() {
            return Ok(None);
        }
        if let Some(nip) = contractor.nip.as_deref() {
            if tables.nip_taken(contractor.user_id, nip, Some(contractor.id)) {
                return Err(conflict(format!("Contractor NIP '{}' already exists", nip)));
            }
        }
        Ok(tables.contractors.get_mut(&contractor.id).map(|stored| {
            *stored = Contractor {
                user_id: stored.user_id,
                created_at: stored.created_at,
                deleted_at: stored.deleted_at,
                ..contractor.clone()
            };
            stored.clone()
        }))
    }

    async fn soft_delete_contractor(
        &self,
        user_id: Uuid,
        contractor_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.live_contractor(user_id, contractor_id).is_none() {
            return Ok(false);
        }
        if let Some(contractor) = tables.contractors.get_mut(&contractor_id) {
            contractor.deleted_at = Some(deleted_at);
            contractor.updated_at = deleted_at;
        }
        Ok(true)
    }
}
