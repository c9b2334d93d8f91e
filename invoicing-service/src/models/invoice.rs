//! Invoice model for invoicing-service.

use super::line_item::{InvoiceItemView, NewInvoiceItem};
use crate::error::InvoicingError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The only currency invoices can currently be issued in.
pub const SUPPORTED_CURRENCY: &str = "PLN";

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "unpaid" => Ok(InvoiceStatus::Unpaid),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(InvoicingError::Validation(format!(
                "Unknown invoice status '{}'",
                other
            ))),
        }
    }
}

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Transfer,
    Cash,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(PaymentMethod::Transfer),
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            other => Err(InvoicingError::Validation(format!(
                "Unknown payment method '{}'",
                other
            ))),
        }
    }
}

/// Seller data copied from the owner's profile when the invoice is created.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSnapshot {
    pub company_name: String,
    pub address: String,
    pub nip: String,
    pub bank_account: Option<String>,
    pub logo_url: Option<String>,
}

/// Buyer data, copied from a contractor or entered by hand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerSnapshot {
    pub name: String,
    pub address: Option<String>,
    pub nip: Option<String>,
}

/// Invoice aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub payment_method: PaymentMethod,
    pub currency: String,
    pub notes: Option<String>,
    pub seller: SellerSnapshot,
    pub buyer: BuyerSnapshot,
    pub contractor_id: Option<Uuid>,
    pub total_net: Decimal,
    pub total_vat: Decimal,
    pub total_gross: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Command for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub payment_method: PaymentMethod,
    /// Defaults to [`SUPPORTED_CURRENCY`].
    pub currency: Option<String>,
    pub notes: Option<String>,
    /// Manual buyer data; when absent it is copied from `contractor_id`.
    pub buyer: Option<BuyerSnapshot>,
    pub contractor_id: Option<Uuid>,
    pub items: Vec<NewInvoiceItem>,
}

/// Command for updating an invoice. Absent fields keep their stored values.
///
/// Nullable fields use a nested `Option`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<Option<String>>,
    pub buyer: Option<BuyerSnapshot>,
    pub contractor_id: Option<Option<Uuid>>,
    /// Replaces the whole item set when present.
    pub items: Option<Vec<NewInvoiceItem>>,
}

/// Column an invoice listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvoiceSortField {
    #[default]
    IssueDate,
    DueDate,
    InvoiceNumber,
    TotalGross,
    CreatedAt,
}

impl InvoiceSortField {
    pub fn column(&self) -> &'static str {
        match self {
            InvoiceSortField::IssueDate => "issue_date",
            InvoiceSortField::DueDate => "due_date",
            InvoiceSortField::InvoiceNumber => "invoice_number",
            InvoiceSortField::TotalGross => "total_gross",
            InvoiceSortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filter, ordering and paging for listing invoices.
#[derive(Debug, Clone)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub contractor_id: Option<Uuid>,
    pub issued_from: Option<NaiveDate>,
    pub issued_to: Option<NaiveDate>,
    /// Case-insensitive match on invoice number or buyer name.
    pub search: Option<String>,
    pub sort_by: InvoiceSortField,
    pub sort_order: SortOrder,
    /// 1-based page index.
    pub page: u32,
    pub limit: u32,
}

impl Default for ListInvoicesQuery {
    fn default() -> Self {
        Self {
            status: None,
            contractor_id: None,
            issued_from: None,
            issued_to: None,
            search: None,
            sort_by: InvoiceSortField::default(),
            sort_order: SortOrder::default(),
            page: 1,
            limit: super::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Fully materialized invoice returned by the lifecycle operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItemView>,
}

/// Confirmation returned by a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: Uuid,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub updated_at: DateTime<Utc>,
}
