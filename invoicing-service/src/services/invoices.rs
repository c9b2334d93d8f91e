//! Invoice lifecycle: create, update, status changes, duplication and
//! soft deletion, plus the read side.
//!
//! Every operation is scoped to the calling user. Persistence failures are
//! logged in full and reach callers as opaque internal errors.

use crate::error::InvoicingError;
use crate::models::{
    normalize_paging, BuyerSnapshot, CreateInvoice, Invoice, InvoiceItem, InvoiceItemView,
    InvoiceStatus, InvoiceView, ListInvoicesQuery, NewInvoiceItem, Paginated, SellerSnapshot,
    StatusChange, UpdateInvoice, UserProfile, SUPPORTED_CURRENCY,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::metrics::{INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL, STATUS_TRANSITIONS_TOTAL};
use crate::services::money::{
    calculate_item_amounts, calculate_totals, ensure_within_limit, has_valid_precision,
};
use crate::services::numbering::generate_number;
use crate::services::observe;
use crate::services::repository::{ContractorRepository, InvoiceRepository, ProfileRepository};
use crate::services::status::{check_transition, ensure_profile_complete, Transition};
use crate::services::validation::{check_length, non_blank, validate_nip};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub const MAX_INVOICE_NUMBER_LEN: usize = 100;
pub const MAX_BUYER_NAME_LEN: usize = 255;
pub const MAX_ITEM_NAME_LEN: usize = 500;
pub const MAX_UNIT_LEN: usize = 20;

pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    profiles: Arc<dyn ProfileRepository>,
    contractors: Arc<dyn ContractorRepository>,
    clock: Arc<dyn Clock>,
}

/// Map a persistence conflict on an invoice write to the number clash it
/// represents.
fn number_conflict(number: &str) -> impl FnOnce(AppError) -> InvoicingError + '_ {
    move |e| match e {
        AppError::Conflict(_) => InvoicingError::NumberExists(number.to_string()),
        other => other.into(),
    }
}

fn check_dates(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), InvoicingError> {
    if due_date < issue_date {
        return Err(InvoicingError::InvalidDates {
            issue_date,
            due_date,
        });
    }
    Ok(())
}

fn validate_items(items: &[NewInvoiceItem]) -> Result<(), InvoicingError> {
    let mut positions = HashSet::with_capacity(items.len());
    for item in items {
        if item.position < 1 {
            return Err(InvoicingError::validation(format!(
                "Item position must be at least 1, got {}",
                item.position
            )));
        }
        if !positions.insert(item.position) {
            return Err(InvoicingError::validation(format!(
                "Duplicate item position {}",
                item.position
            )));
        }
        if item.name.trim().is_empty() {
            return Err(InvoicingError::validation(format!(
                "Item {} has no name",
                item.position
            )));
        }
        check_length(
            &format!("Item {} name", item.position),
            &item.name,
            MAX_ITEM_NAME_LEN,
        )?;
        check_length(
            &format!("Item {} unit", item.position),
            &item.unit_or_default(),
            MAX_UNIT_LEN,
        )?;
        if item.quantity <= Decimal::ZERO {
            return Err(InvoicingError::validation(format!(
                "Item {} quantity must be positive",
                item.position
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(InvoicingError::validation(format!(
                "Item {} unit price must not be negative",
                item.position
            )));
        }
        if !has_valid_precision(item.quantity) || !has_valid_precision(item.unit_price) {
            return Err(InvoicingError::validation(format!(
                "Item {} amounts allow at most two decimal places",
                item.position
            )));
        }
        ensure_within_limit(&format!("Item {} quantity", item.position), item.quantity)?;
        ensure_within_limit(&format!("Item {} unit price", item.position), item.unit_price)?;
    }
    Ok(())
}

fn validate_invoice_number(raw: &str) -> Result<String, InvoicingError> {
    let number = raw.trim();
    check_length("Invoice number", number, MAX_INVOICE_NUMBER_LEN)?;
    Ok(number.to_string())
}

fn validate_buyer(buyer: BuyerSnapshot) -> Result<BuyerSnapshot, InvoicingError> {
    let name = buyer.name.trim().to_string();
    if name.is_empty() {
        return Err(InvoicingError::validation("Buyer name is required"));
    }
    check_length("Buyer name", &name, MAX_BUYER_NAME_LEN)?;
    let nip = non_blank(buyer.nip)
        .map(|nip| validate_nip(&nip))
        .transpose()?;
    Ok(BuyerSnapshot {
        name,
        address: non_blank(buyer.address),
        nip,
    })
}

fn ensure_has_items(count: usize, status: InvoiceStatus) -> Result<(), InvoicingError> {
    if count == 0 && status != InvoiceStatus::Draft {
        return Err(InvoicingError::validation(format!(
            "A {} invoice needs at least one item",
            status
        )));
    }
    Ok(())
}

fn seller_snapshot(profile: &UserProfile) -> SellerSnapshot {
    let text = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().to_string();
    SellerSnapshot {
        company_name: text(&profile.company_name),
        address: text(&profile.address),
        nip: text(&profile.nip),
        bank_account: profile.bank_account.clone(),
        logo_url: profile.logo_url.clone(),
    }
}

fn item_view(item: &InvoiceItem) -> Result<InvoiceItemView, InvoicingError> {
    let amounts = calculate_item_amounts(item.quantity, item.unit_price, item.vat_rate)?;
    Ok(InvoiceItemView {
        id: item.id,
        position: item.position,
        name: item.name.clone(),
        unit: item.unit.clone(),
        quantity: item.quantity,
        unit_price: item.unit_price,
        vat_rate: item.vat_rate,
        net_amount: amounts.net,
        vat_amount: amounts.vat,
        gross_amount: amounts.gross,
    })
}

fn build_view(invoice: Invoice, items: &[InvoiceItem]) -> Result<InvoiceView, InvoicingError> {
    Ok(InvoiceView {
        invoice,
        items: items.iter().map(item_view).collect::<Result<_, _>>()?,
    })
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        profiles: Arc<dyn ProfileRepository>,
        contractors: Arc<dyn ContractorRepository>,
    ) -> Self {
        Self::with_clock(invoices, profiles, contractors, Arc::new(SystemClock))
    }

    pub fn with_clock(
        invoices: Arc<dyn InvoiceRepository>,
        profiles: Arc<dyn ProfileRepository>,
        contractors: Arc<dyn ContractorRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            invoices,
            profiles,
            contractors,
            clock,
        }
    }

    /// Create an invoice with its items. A blank number takes the next one
    /// from the owner's numbering sequence.
    #[instrument(skip(self, cmd), fields(user_id = %user_id, status = %cmd.status))]
    pub async fn create(
        &self,
        user_id: Uuid,
        cmd: CreateInvoice,
    ) -> Result<InvoiceView, InvoicingError> {
        observe("create", self.create_invoice(user_id, cmd).await)
    }

    #[instrument(skip(self, cmd), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn update(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        cmd: UpdateInvoice,
    ) -> Result<InvoiceView, InvoicingError> {
        observe("update", self.update_invoice(user_id, invoice_id, cmd).await)
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id, status = %status))]
    pub async fn update_status(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<StatusChange, InvoicingError> {
        observe(
            "update_status",
            self.change_status(user_id, invoice_id, status).await,
        )
    }

    /// Copy an invoice into a new draft dated today.
    #[instrument(skip(self, invoice_number), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn duplicate(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        invoice_number: Option<String>,
    ) -> Result<InvoiceView, InvoicingError> {
        observe(
            "duplicate",
            self.duplicate_invoice(user_id, invoice_id, invoice_number)
                .await,
        )
    }

    /// Soft-delete an invoice. Its items stay in place.
    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn remove(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), InvoicingError> {
        observe("remove", self.remove_invoice(user_id, invoice_id).await)
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    pub async fn find_one(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceView, InvoicingError> {
        observe("find_one", self.load_view(user_id, invoice_id).await)
    }

    #[instrument(skip(self, query), fields(user_id = %user_id))]
    pub async fn find_all(
        &self,
        user_id: Uuid,
        query: ListInvoicesQuery,
    ) -> Result<Paginated<InvoiceView>, InvoicingError> {
        observe("find_all", self.list_views(user_id, query).await)
    }

    /// Number the next auto-numbered invoice would receive.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn next_number(&self, user_id: Uuid) -> Result<String, InvoicingError> {
        observe("next_number", self.preview_number(user_id).await)
    }

    async fn load_profile(&self, user_id: Uuid) -> Result<UserProfile, InvoicingError> {
        self.profiles
            .get_profile(user_id)
            .await?
            .ok_or(InvoicingError::NotFound("User profile"))
    }

    async fn load_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<Invoice, InvoicingError> {
        self.invoices
            .get_invoice(user_id, invoice_id)
            .await?
            .ok_or(InvoicingError::NotFound("Invoice"))
    }

    async fn load_view(&self, user_id: Uuid, invoice_id: Uuid) -> Result<InvoiceView, InvoicingError> {
        let invoice = self.load_invoice(user_id, invoice_id).await?;
        let items = self.invoices.get_items(user_id, invoice_id).await?;
        build_view(invoice, &items)
    }

    async fn preview_number(&self, user_id: Uuid) -> Result<String, InvoicingError> {
        let profile = self.load_profile(user_id).await?;
        Ok(self.number_after(&profile))
    }

    fn number_after(&self, profile: &UserProfile) -> String {
        let next = profile.invoice_number_counter.max(0) as u64 + 1;
        generate_number(&profile.invoice_number_format, next, self.clock.today())
    }

    async fn ensure_number_free(
        &self,
        user_id: Uuid,
        number: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), InvoicingError> {
        if self
            .invoices
            .invoice_number_exists(user_id, number, exclude)
            .await?
        {
            warn!(invoice_number = %number, "Invoice number already taken");
            return Err(InvoicingError::NumberExists(number.to_string()));
        }
        Ok(())
    }

    /// Buyer snapshot for a write: manual data wins, otherwise the buyer is
    /// copied from the referenced contractor.
    async fn resolve_buyer(
        &self,
        user_id: Uuid,
        buyer: Option<BuyerSnapshot>,
        contractor_id: Option<Uuid>,
    ) -> Result<BuyerSnapshot, InvoicingError> {
        let contractor = match contractor_id {
            Some(id) => Some(
                self.contractors
                    .get_contractor(user_id, id)
                    .await?
                    .ok_or_else(|| {
                        InvoicingError::validation(format!("Contractor {} does not exist", id))
                    })?,
            ),
            None => None,
        };

        match (buyer, contractor) {
            (Some(buyer), _) => validate_buyer(buyer),
            (None, Some(contractor)) => Ok(BuyerSnapshot {
                name: contractor.name,
                address: contractor.address,
                nip: contractor.nip,
            }),
            (None, None) => Err(InvoicingError::validation(
                "Either buyer data or a contractor is required",
            )),
        }
    }

    async fn create_invoice(
        &self,
        user_id: Uuid,
        cmd: CreateInvoice,
    ) -> Result<InvoiceView, InvoicingError> {
        check_dates(cmd.issue_date, cmd.due_date)?;
        validate_items(&cmd.items)?;
        ensure_has_items(cmd.items.len(), cmd.status)?;

        let currency = match cmd.currency.as_deref().map(str::trim) {
            None | Some("") => SUPPORTED_CURRENCY.to_string(),
            Some(c) if c.eq_ignore_ascii_case(SUPPORTED_CURRENCY) => SUPPORTED_CURRENCY.to_string(),
            Some(c) => {
                return Err(InvoicingError::validation(format!(
                    "Unsupported currency '{}'",
                    c
                )))
            }
        };

        let profile = self.load_profile(user_id).await?;

        let invoice_number = match validate_invoice_number(&cmd.invoice_number)? {
            n if n.is_empty() => self.number_after(&profile),
            n => n,
        };
        self.ensure_number_free(user_id, &invoice_number, None)
            .await?;

        if cmd.status.requires_complete_profile() {
            ensure_profile_complete(&profile)?;
        }

        let buyer = self
            .resolve_buyer(user_id, cmd.buyer, cmd.contractor_id)
            .await?;
        let totals = calculate_totals(&cmd.items)?;
        let now = self.clock.now();

        let invoice = Invoice {
            id: Uuid::new_v4(),
            user_id,
            invoice_number,
            issue_date: cmd.issue_date,
            due_date: cmd.due_date,
            status: cmd.status,
            payment_method: cmd.payment_method,
            currency,
            notes: cmd.notes,
            seller: seller_snapshot(&profile),
            buyer,
            contractor_id: cmd.contractor_id,
            total_net: totals.total_net,
            total_vat: totals.total_vat,
            total_gross: totals.total_gross,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let invoice = self
            .invoices
            .insert_invoice(&invoice)
            .await
            .map_err(number_conflict(&invoice.invoice_number))?;

        let items = if cmd.items.is_empty() {
            Vec::new()
        } else {
            match self
                .invoices
                .insert_items(user_id, invoice.id, &cmd.items)
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    warn!(invoice_id = %invoice.id, error = %e, "Item insert failed, removing invoice");
                    self.discard(user_id, invoice.id).await;
                    return Err(e.into());
                }
            }
        };

        // Every stored invoice must be covered by the counter.
        if let Err(e) = self.profiles.increment_invoice_counter(user_id).await {
            warn!(invoice_id = %invoice.id, error = %e, "Counter increment failed, removing invoice");
            self.discard(user_id, invoice.id).await;
            return Err(e.into());
        }

        INVOICES_TOTAL
            .with_label_values(&[invoice.status.as_str()])
            .inc();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[invoice.currency.as_str()])
            .inc_by(invoice.total_gross.to_f64().unwrap_or(0.0));

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total_gross = %invoice.total_gross,
            "Invoice created"
        );

        build_view(invoice, &items)
    }

    /// Hard-delete a half-created invoice and its items.
    async fn discard(&self, user_id: Uuid, invoice_id: Uuid) {
        if let Err(e) = self.invoices.purge_invoice(user_id, invoice_id).await {
            error!(
                invoice_id = %invoice_id,
                error = %e,
                "Failed to remove partially created invoice"
            );
        }
    }

    async fn update_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        cmd: UpdateInvoice,
    ) -> Result<InvoiceView, InvoicingError> {
        let existing = self.load_invoice(user_id, invoice_id).await?;

        let issue_date = cmd.issue_date.unwrap_or(existing.issue_date);
        let due_date = cmd.due_date.unwrap_or(existing.due_date);
        check_dates(issue_date, due_date)?;

        let invoice_number = match cmd.invoice_number.as_deref().map(str::trim) {
            None => existing.invoice_number.clone(),
            Some("") => return Err(InvoicingError::validation("Invoice number must not be blank")),
            Some(n) => validate_invoice_number(n)?,
        };
        if invoice_number != existing.invoice_number {
            self.ensure_number_free(user_id, &invoice_number, Some(invoice_id))
                .await?;
        }

        if let Some(items) = &cmd.items {
            validate_items(items)?;
            ensure_has_items(items.len(), existing.status)?;
        }

        let contractor_id = cmd.contractor_id.unwrap_or(existing.contractor_id);
        let contractor_changed = contractor_id != existing.contractor_id;
        let buyer = match (cmd.buyer, contractor_changed) {
            (Some(buyer), _) => {
                if contractor_changed {
                    self.resolve_buyer(user_id, Some(buyer), contractor_id).await?
                } else {
                    validate_buyer(buyer)?
                }
            }
            (None, true) if contractor_id.is_some() => {
                self.resolve_buyer(user_id, None, contractor_id).await?
            }
            (None, _) => existing.buyer.clone(),
        };

        let mut updated = Invoice {
            invoice_number,
            issue_date,
            due_date,
            payment_method: cmd.payment_method.unwrap_or(existing.payment_method),
            notes: cmd.notes.unwrap_or_else(|| existing.notes.clone()),
            buyer,
            contractor_id,
            updated_at: self.clock.now(),
            ..existing.clone()
        };

        let previous_items = match &cmd.items {
            Some(items) => {
                let totals = calculate_totals(items)?;
                updated.total_net = totals.total_net;
                updated.total_vat = totals.total_vat;
                updated.total_gross = totals.total_gross;
                let previous = self.invoices.get_items(user_id, invoice_id).await?;
                self.replace_items(user_id, invoice_id, items, &previous)
                    .await?;
                Some(previous)
            }
            None => None,
        };

        let stored = match self.invoices.update_invoice(&updated).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Err(InvoicingError::NotFound("Invoice")),
            Err(e) => {
                if let Some(previous) = &previous_items {
                    self.restore_items(user_id, invoice_id, previous).await;
                }
                return Err(number_conflict(&updated.invoice_number)(e));
            }
        };

        let items = self.invoices.get_items(user_id, invoice_id).await?;

        info!(
            invoice_number = %stored.invoice_number,
            items_replaced = previous_items.is_some(),
            "Invoice updated"
        );

        build_view(stored, &items)
    }

    /// Swap the whole item set, putting the previous set back if the new
    /// one cannot be stored.
    async fn replace_items(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
        previous: &[InvoiceItem],
    ) -> Result<(), InvoicingError> {
        self.invoices.delete_items(user_id, invoice_id).await?;
        if items.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.invoices.insert_items(user_id, invoice_id, items).await {
            warn!(error = %e, "Item replacement failed, restoring previous items");
            self.restore_items(user_id, invoice_id, previous).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn restore_items(&self, user_id: Uuid, invoice_id: Uuid, previous: &[InvoiceItem]) {
        let restore: Vec<NewInvoiceItem> = previous.iter().map(NewInvoiceItem::from).collect();
        let result = async {
            self.invoices.delete_items(user_id, invoice_id).await?;
            if !restore.is_empty() {
                self.invoices
                    .insert_items(user_id, invoice_id, &restore)
                    .await?;
            }
            Ok::<(), AppError>(())
        }
        .await;
        if let Err(e) = result {
            error!(invoice_id = %invoice_id, error = %e, "Failed to restore invoice items");
        }
    }

    async fn change_status(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<StatusChange, InvoicingError> {
        let invoice = self.load_invoice(user_id, invoice_id).await?;

        let (from, to) = match check_transition(invoice.status, status) {
            Ok(Transition::Changed { from, to }) => (from, to),
            Ok(Transition::Unchanged) => {
                return Ok(StatusChange {
                    id: invoice.id,
                    invoice_number: invoice.invoice_number,
                    status: invoice.status,
                    updated_at: invoice.updated_at,
                })
            }
            Err(e) => {
                warn!(from = %invoice.status, to = %status, "Rejected status transition");
                return Err(e);
            }
        };

        if to.requires_complete_profile() {
            let profile = self.load_profile(user_id).await?;
            ensure_profile_complete(&profile)?;
            let items = self.invoices.get_items(user_id, invoice_id).await?;
            ensure_has_items(items.len(), to)?;
        }

        let updated = self
            .invoices
            .update_status(user_id, invoice_id, to, self.clock.now())
            .await?
            .ok_or(InvoicingError::NotFound("Invoice"))?;

        STATUS_TRANSITIONS_TOTAL
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();

        info!(from = %from, to = %to, invoice_number = %updated.invoice_number, "Invoice status changed");

        Ok(StatusChange {
            id: updated.id,
            invoice_number: updated.invoice_number,
            status: updated.status,
            updated_at: updated.updated_at,
        })
    }

    async fn duplicate_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        invoice_number: Option<String>,
    ) -> Result<InvoiceView, InvoicingError> {
        let source = self.load_invoice(user_id, invoice_id).await?;
        let source_items = self.invoices.get_items(user_id, invoice_id).await?;

        let invoice_number = match invoice_number.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => {
                self.ensure_number_free(user_id, n, None).await?;
                n.to_string()
            }
            _ => self.preview_number(user_id).await?,
        };

        // A contractor deleted since the source was issued is not carried
        // over; the buyer snapshot still is.
        let contractor_id = match source.contractor_id {
            Some(id) => self
                .contractors
                .get_contractor(user_id, id)
                .await?
                .map(|c| c.id),
            None => None,
        };

        let items = source_items
            .iter()
            .enumerate()
            .map(|(index, item)| NewInvoiceItem {
                position: index as i32 + 1,
                ..NewInvoiceItem::from(item)
            })
            .collect();

        let today = self.clock.today();
        let cmd = CreateInvoice {
            invoice_number,
            issue_date: today,
            due_date: today,
            status: InvoiceStatus::Draft,
            payment_method: source.payment_method,
            currency: Some(source.currency),
            notes: source.notes,
            buyer: Some(source.buyer),
            contractor_id,
            items,
        };

        let view = self.create_invoice(user_id, cmd).await?;
        info!(
            source_invoice_id = %invoice_id,
            invoice_id = %view.invoice.id,
            "Invoice duplicated"
        );
        Ok(view)
    }

    async fn remove_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> Result<(), InvoicingError> {
        let deleted = self
            .invoices
            .soft_delete_invoice(user_id, invoice_id, self.clock.now())
            .await?;
        if !deleted {
            return Err(InvoicingError::NotFound("Invoice"));
        }
        info!("Invoice deleted");
        Ok(())
    }

    async fn list_views(
        &self,
        user_id: Uuid,
        query: ListInvoicesQuery,
    ) -> Result<Paginated<InvoiceView>, InvoicingError> {
        if let (Some(from), Some(to)) = (query.issued_from, query.issued_to) {
            if to < from {
                return Err(InvoicingError::validation(
                    "Issue date range ends before it starts",
                ));
            }
        }

        let (page, limit, _) = normalize_paging(query.page, query.limit);
        let query = ListInvoicesQuery {
            page,
            limit,
            ..query
        };
        let (invoices, total) = self.invoices.list_invoices(user_id, &query).await?;

        let mut items = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let invoice_items = self.invoices.get_items(user_id, invoice.id).await?;
            items.push(build_view(invoice, &invoice_items)?);
        }

        Ok(Paginated {
            items,
            total,
            page,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VatRate;
    use rust_decimal_macros::dec;

    fn item(position: i32) -> NewInvoiceItem {
        NewInvoiceItem {
            position,
            name: "Consulting".to_string(),
            unit: None,
            quantity: dec!(1),
            unit_price: dec!(100.00),
            vat_rate: VatRate::Rate23,
        }
    }

    #[test]
    fn due_date_may_equal_issue_date() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(check_dates(day, day).is_ok());
        assert!(check_dates(day, day.pred_opt().unwrap()).is_err());
    }

    #[test]
    fn items_need_unique_positive_positions() {
        assert!(validate_items(&[item(1), item(2)]).is_ok());
        assert!(validate_items(&[item(1), item(1)]).is_err());
        assert!(validate_items(&[item(0)]).is_err());
    }

    #[test]
    fn items_reject_bad_amounts() {
        let zero_quantity = NewInvoiceItem {
            quantity: dec!(0),
            ..item(1)
        };
        let negative_price = NewInvoiceItem {
            unit_price: dec!(-1),
            ..item(1)
        };
        let fine_price = NewInvoiceItem {
            unit_price: dec!(0.001),
            ..item(1)
        };
        let blank_name = NewInvoiceItem {
            name: "  ".to_string(),
            ..item(1)
        };
        for bad in [zero_quantity, negative_price, fine_price, blank_name] {
            assert!(validate_items(&[bad]).is_err());
        }
    }

    #[test]
    fn free_items_are_allowed() {
        let free = NewInvoiceItem {
            unit_price: dec!(0),
            ..item(1)
        };
        assert!(validate_items(&[free]).is_ok());
    }

    #[test]
    fn items_are_bounded_by_column_sizes() {
        let huge_price = NewInvoiceItem {
            unit_price: dec!(1000000000000),
            ..item(1)
        };
        let long_name = NewInvoiceItem {
            name: "x".repeat(MAX_ITEM_NAME_LEN + 1),
            ..item(1)
        };
        let long_unit = NewInvoiceItem {
            unit: Some("u".repeat(MAX_UNIT_LEN + 1)),
            ..item(1)
        };
        for bad in [huge_price, long_name, long_unit] {
            let err = validate_items(&[bad]).unwrap_err();
            assert!(matches!(err, InvoicingError::Validation(_)));
        }
    }

    #[test]
    fn buyer_nip_is_checked_and_normalized() {
        let buyer = validate_buyer(BuyerSnapshot {
            name: " Klient ".to_string(),
            address: Some("  ".to_string()),
            nip: Some("526-025-02-74".to_string()),
        })
        .unwrap();
        assert_eq!(buyer.name, "Klient");
        assert_eq!(buyer.address, None);
        assert_eq!(buyer.nip.as_deref(), Some("5260250274"));

        let err = validate_buyer(BuyerSnapshot {
            name: "Klient".to_string(),
            address: None,
            nip: Some("5260250275".to_string()),
        })
        .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));
    }

    #[test]
    fn long_invoice_numbers_are_rejected() {
        assert_eq!(validate_invoice_number(" FV/1 ").unwrap(), "FV/1");
        assert!(validate_invoice_number(&"9".repeat(MAX_INVOICE_NUMBER_LEN + 1)).is_err());
    }

    #[test]
    fn only_drafts_may_be_empty() {
        assert!(ensure_has_items(0, InvoiceStatus::Draft).is_ok());
        assert!(ensure_has_items(0, InvoiceStatus::Unpaid).is_err());
        assert!(ensure_has_items(1, InvoiceStatus::Paid).is_ok());
    }
}
