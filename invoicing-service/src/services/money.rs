//! Fixed-point money arithmetic for line items and invoice totals.
//!
//! Every amount is rounded to two decimal places, half away from zero, and
//! carries scale 2 so it renders as `"10.00"`. Totals sum item net and VAT
//! independently and derive gross from them.

use crate::error::InvoicingError;
use crate::models::{InvoiceItem, NewInvoiceItem, VatRate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::str::FromStr;

/// Fractional digits allowed on quantities and prices.
pub const MAX_INPUT_SCALE: u32 = 2;

/// Largest amount a `NUMERIC(14, 2)` column holds: 999 999 999 999.99.
/// Quantities, prices, line amounts and invoice totals are all bounded by it.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

/// Net, VAT and gross for a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemAmounts {
    pub net: Decimal,
    pub vat: Decimal,
    pub gross: Decimal,
}

/// Invoice-level totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_net: Decimal,
    pub total_vat: Decimal,
    pub total_gross: Decimal,
}

impl Default for Totals {
    fn default() -> Self {
        Self {
            total_net: round_money(Decimal::ZERO),
            total_vat: round_money(Decimal::ZERO),
            total_gross: round_money(Decimal::ZERO),
        }
    }
}

/// Anything carrying the inputs of an item amount calculation.
pub trait Taxable {
    fn quantity(&self) -> Decimal;
    fn unit_price(&self) -> Decimal;
    fn vat_rate(&self) -> VatRate;
}

impl Taxable for NewInvoiceItem {
    fn quantity(&self) -> Decimal {
        self.quantity
    }
    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
    fn vat_rate(&self) -> VatRate {
        self.vat_rate
    }
}

impl Taxable for InvoiceItem {
    fn quantity(&self) -> Decimal {
        self.quantity
    }
    fn unit_price(&self) -> Decimal {
        self.unit_price
    }
    fn vat_rate(&self) -> VatRate {
        self.vat_rate
    }
}

/// Round to cents and pin the scale to 2.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

fn too_large(what: &str) -> InvoicingError {
    InvoicingError::validation(format!(
        "{} exceeds the largest supported amount {}",
        what, MAX_AMOUNT
    ))
}

/// Fail with a validation error when `amount` is above [`MAX_AMOUNT`].
pub fn ensure_within_limit(what: &str, amount: Decimal) -> Result<Decimal, InvoicingError> {
    if amount > MAX_AMOUNT {
        return Err(too_large(what));
    }
    Ok(amount)
}

pub fn calculate_item_amounts(
    quantity: Decimal,
    unit_price: Decimal,
    vat_rate: VatRate,
) -> Result<ItemAmounts, InvoicingError> {
    let net = quantity
        .checked_mul(unit_price)
        .map(round_money)
        .ok_or_else(|| too_large("Item net amount"))?;
    let vat = net
        .checked_mul(vat_rate.multiplier())
        .map(round_money)
        .ok_or_else(|| too_large("Item VAT amount"))?;
    let gross = net
        .checked_add(vat)
        .ok_or_else(|| too_large("Item gross amount"))?;

    Ok(ItemAmounts {
        net,
        vat,
        gross: ensure_within_limit("Item gross amount", gross)?,
    })
}

pub fn calculate_totals<T: Taxable>(items: &[T]) -> Result<Totals, InvoicingError> {
    let (total_net, total_vat) = items.iter().try_fold(
        (round_money(Decimal::ZERO), round_money(Decimal::ZERO)),
        |(net, vat), item| {
            let amounts =
                calculate_item_amounts(item.quantity(), item.unit_price(), item.vat_rate())?;
            let net = net
                .checked_add(amounts.net)
                .ok_or_else(|| too_large("Invoice net total"))?;
            let vat = vat
                .checked_add(amounts.vat)
                .ok_or_else(|| too_large("Invoice VAT total"))?;
            Ok::<_, InvoicingError>((net, vat))
        },
    )?;
    let total_gross = total_net
        .checked_add(total_vat)
        .ok_or_else(|| too_large("Invoice gross total"))?;

    Ok(Totals {
        total_net,
        total_vat,
        total_gross: ensure_within_limit("Invoice gross total", total_gross)?,
    })
}

/// Whether `amount` fits the two-fractional-digit input precision.
pub fn has_valid_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= MAX_INPUT_SCALE
}

/// Parse an exact decimal string such as `"12.50"`.
pub fn parse_amount(field: &str, raw: &str) -> Result<Decimal, InvoicingError> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|_| InvoicingError::validation(format!("{} '{}' is not a decimal number", field, raw)))?;
    if !has_valid_precision(value) {
        return Err(InvoicingError::validation(format!(
            "{} '{}' has more than {} decimal places",
            field, raw, MAX_INPUT_SCALE
        )));
    }
    ensure_within_limit(field, value)
}
