//! Invoice line item model for invoicing-service.

use crate::error::InvoicingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unit label used when a line item does not name one.
pub const DEFAULT_UNIT: &str = "szt.";

/// VAT rate applied to a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VatRate {
    #[serde(rename = "23")]
    Rate23,
    #[serde(rename = "8")]
    Rate8,
    #[serde(rename = "5")]
    Rate5,
    #[serde(rename = "0")]
    Rate0,
    /// Exempt from VAT ("zwolniony").
    #[serde(rename = "zw")]
    Exempt,
}

impl VatRate {
    pub const ALL: [VatRate; 5] = [
        VatRate::Rate23,
        VatRate::Rate8,
        VatRate::Rate5,
        VatRate::Rate0,
        VatRate::Exempt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VatRate::Rate23 => "23",
            VatRate::Rate8 => "8",
            VatRate::Rate5 => "5",
            VatRate::Rate0 => "0",
            VatRate::Exempt => "zw",
        }
    }

    /// Multiplier applied to the net amount.
    pub fn multiplier(&self) -> Decimal {
        match self {
            VatRate::Rate23 => Decimal::new(23, 2),
            VatRate::Rate8 => Decimal::new(8, 2),
            VatRate::Rate5 => Decimal::new(5, 2),
            VatRate::Rate0 | VatRate::Exempt => Decimal::ZERO,
        }
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VatRate {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "23" => Ok(VatRate::Rate23),
            "8" => Ok(VatRate::Rate8),
            "5" => Ok(VatRate::Rate5),
            "0" => Ok(VatRate::Rate0),
            "zw" => Ok(VatRate::Exempt),
            other => Err(InvoicingError::Validation(format!(
                "Unsupported VAT rate '{}'",
                other
            ))),
        }
    }
}

/// Line item as stored, owned by exactly one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: VatRate,
    pub created_at: DateTime<Utc>,
}

/// Input for a line item on create/update.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceItem {
    pub position: i32,
    pub name: String,
    pub unit: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: VatRate,
}

impl NewInvoiceItem {
    /// Build an item from its wire representation, where amounts travel as
    /// exact decimal strings.
    pub fn parse(
        position: i32,
        name: impl Into<String>,
        unit: Option<String>,
        quantity: &str,
        unit_price: &str,
        vat_rate: &str,
    ) -> Result<Self, InvoicingError> {
        Ok(Self {
            position,
            name: name.into(),
            unit,
            quantity: crate::services::money::parse_amount("quantity", quantity)?,
            unit_price: crate::services::money::parse_amount("unitPrice", unit_price)?,
            vat_rate: vat_rate.parse()?,
        })
    }

    /// Unit label, falling back to [`DEFAULT_UNIT`].
    pub fn unit_or_default(&self) -> String {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_UNIT)
            .to_string()
    }
}

impl From<&InvoiceItem> for NewInvoiceItem {
    fn from(item: &InvoiceItem) -> Self {
        Self {
            position: item.position,
            name: item.name.clone(),
            unit: Some(item.unit.clone()),
            quantity: item.quantity,
            unit_price: item.unit_price,
            vat_rate: item.vat_rate,
        }
    }
}

/// Line item as returned to callers, with amounts derived on read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemView {
    pub id: Uuid,
    pub position: i32,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_rate: VatRate,
    pub net_amount: Decimal,
    pub vat_amount: Decimal,
    pub gross_amount: Decimal,
}
