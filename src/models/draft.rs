//! The ephemeral customer-editable reservation draft and its priced form.
//!
//! A draft is created when a customer selects a slot, mutated as quantities
//! and coupons change, and consumed read-only by pricing and checkout. It is
//! never persisted; a typed value crossing an in-process boundary replaces
//! the source system's string-keyed local-storage blob.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::availability::ExpandedSlot;
use super::coupon::DiscountType;

/// A priced line within a draft: one consultation fee times a token count, or
/// one entry of a multi-line service selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Whether the tax is already folded into displayed prices or added on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    Inclusive,
    Exclusive,
}

/// A successfully validated coupon, ready to apply to a draft.
///
/// Applying a new coupon always fully replaces any previous one; discounts
/// never stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponApplication {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub total_after_discount: Decimal,
}

/// Uncommitted selection of slot + line items, prior to checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReservation {
    pub provider_id: Uuid,
    pub customer_id: Uuid,
    pub date: NaiveDate,
    pub slot: ExpandedSlot,
    pub line_items: Vec<LineItem>,
    pub applied_coupon: Option<CouponApplication>,
}

impl DraftReservation {
    /// Tokens requested by this draft (the quantity reserved against the
    /// slot). A single-consultation draft carries one line item whose
    /// quantity is the token count.
    pub fn token_quantity(&self) -> u32 {
        self.line_items.iter().map(|li| li.quantity).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.line_items.iter().map(LineItem::line_total).sum()
    }
}

/// Fully recomputed totals for a draft. Never patched incrementally; any
/// draft mutation produces a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedDraft {
    pub subtotal: Decimal,
    pub tax_mode: TaxMode,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
}
