//! Domain models for invoicing-service.

mod contractor;
mod invoice;
mod line_item;
mod profile;

use serde::Serialize;

pub use contractor::{Contractor, CreateContractor, ListContractorsQuery, UpdateContractor};
pub use invoice::{
    BuyerSnapshot, CreateInvoice, Invoice, InvoiceSortField, InvoiceStatus, InvoiceView,
    ListInvoicesQuery, PaymentMethod, SellerSnapshot, SortOrder, StatusChange, UpdateInvoice,
    SUPPORTED_CURRENCY,
};
pub use line_item::{InvoiceItem, InvoiceItemView, NewInvoiceItem, VatRate, DEFAULT_UNIT};
pub use profile::{UpdateProfile, UserProfile, DEFAULT_NUMBER_FORMAT};

/// Page size used when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a listing will return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Clamp caller paging input to a valid `(page, limit, offset)` triple.
pub fn normalize_paging(page: u32, limit: u32) -> (u32, u32, u64) {
    let page = page.max(1);
    let limit = match limit {
        0 => DEFAULT_PAGE_SIZE,
        l => l.min(MAX_PAGE_SIZE),
    };
    let offset = u64::from(page - 1) * u64::from(limit);
    (page, limit, offset)
}
