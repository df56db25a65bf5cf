//! Draft pricing: subtotal, discount, and tax folded into a fresh
//! `PricedDraft` on every call. Totals are never patched in place.

use rust_decimal::Decimal;

use crate::catalog::TaxSettings;
use crate::models::{CouponApplication, LineItem, PricedDraft, TaxMode};

#[derive(Debug, Clone, Default)]
pub struct PricingEngine;

impl PricingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Recomputes a draft's totals from scratch.
    ///
    /// Inclusive tax mode (or a zero rate) reports zero tax and leaves the
    /// discounted subtotal as the total; the tax is already inside the
    /// displayed prices. Exclusive mode adds `rate`% of the discounted
    /// subtotal on top. Money is rounded to two places at each derived step.
    pub fn price(
        &self,
        line_items: &[LineItem],
        tax: &TaxSettings,
        coupon: Option<&CouponApplication>,
    ) -> PricedDraft {
        let subtotal: Decimal = line_items.iter().map(LineItem::line_total).sum();
        let subtotal = subtotal.round_dp(2);

        let discount_amount = coupon
            .map(|c| c.discount_amount.min(subtotal))
            .unwrap_or(Decimal::ZERO)
            .round_dp(2);
        let discounted = (subtotal - discount_amount).max(Decimal::ZERO);

        let (tax_amount, total) = match tax.mode {
            TaxMode::Exclusive if !tax.rate.is_zero() => {
                let tax_amount = (discounted * tax.rate / Decimal::ONE_HUNDRED).round_dp(2);
                (tax_amount, (discounted + tax_amount).round_dp(2))
            }
            _ => (Decimal::ZERO, discounted.round_dp(2)),
        };

        PricedDraft {
            subtotal,
            tax_mode: tax.mode,
            tax_rate: tax.rate,
            tax_amount,
            discount_amount,
            total,
        }
    }
}
