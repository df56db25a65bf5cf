//! Coupon validation against catalog records.
//!
//! Validation order is fixed: existence, minimum amount, validity window,
//! usage limit. A valid coupon yields a `CouponApplication` that fully
//! replaces any previously applied one; discounts never stack. Usage counts
//! are only incremented after a booking confirms.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::errors::{CouponError, ServiceError};
use crate::models::{Coupon, CouponApplication, DiscountType};

pub struct CouponValidator {
    catalog: Arc<dyn CatalogService>,
}

impl CouponValidator {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog }
    }

    /// Validates a code against the current draft total.
    #[instrument(skip(self), fields(provider_id = %provider_id))]
    pub async fn validate(
        &self,
        provider_id: Uuid,
        code: &str,
        total: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CouponApplication, ServiceError> {
        let coupon = self
            .catalog
            .find_coupon(provider_id, code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.trim().to_string()))?;
        Ok(apply(&coupon, total, now)?)
    }

    /// Currently redeemable coupons for a provider's listing page.
    pub async fn list_active(&self, provider_id: Uuid) -> Result<Vec<Coupon>, ServiceError> {
        self.catalog.list_active_coupons(provider_id).await
    }

    /// Records one redemption after the booking it discounted confirms.
    pub async fn record_redemption(&self, coupon_id: Uuid) -> Result<(), ServiceError> {
        self.catalog.increment_coupon_usage(coupon_id).await
    }
}

/// Pure application of a coupon to a total.
///
/// Percentage discounts take `value`% of the total; fixed discounts are
/// capped at the total so it never goes negative.
pub fn apply(
    coupon: &Coupon,
    total: Decimal,
    now: DateTime<Utc>,
) -> Result<CouponApplication, CouponError> {
    if let Some(minimum) = coupon.min_booking_amount {
        if total < minimum {
            return Err(CouponError::BelowMinimum {
                minimum: minimum.to_string(),
                total: total.to_string(),
            });
        }
    }
    if !coupon.is_within_validity(now) {
        return Err(CouponError::Expired(coupon.code.clone()));
    }
    if coupon.usage_exhausted() {
        return Err(CouponError::UsageExceeded(coupon.code.clone()));
    }

    let discount_amount = match coupon.discount_type {
        DiscountType::Percentage => {
            (total * coupon.discount_value / Decimal::ONE_HUNDRED).round_dp(2)
        }
        DiscountType::Fixed => coupon.discount_value.min(total),
    };

    Ok(CouponApplication {
        code: coupon.code.clone(),
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        discount_amount,
        total_after_discount: (total - discount_amount).max(Decimal::ZERO),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            code: "SAVE".into(),
            discount_type,
            discount_value: value,
            min_booking_amount: None,
            usage_limit: None,
            usage_count: 0,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: Utc::now() + Duration::days(1),
        }
    }

    #[test]
    fn percentage_discount_is_proportional() {
        let a = apply(&coupon(DiscountType::Percentage, dec!(10)), dec!(750), Utc::now()).unwrap();
        assert_eq!(a.discount_amount, dec!(75));
        assert_eq!(a.total_after_discount, dec!(675));
    }

    #[test]
    fn fixed_discount_is_capped_at_total() {
        let a = apply(&coupon(DiscountType::Fixed, dec!(500)), dec!(300), Utc::now()).unwrap();
        assert_eq!(a.discount_amount, dec!(300));
        assert_eq!(a.total_after_discount, dec!(0));
    }

    #[test]
    fn below_minimum_is_rejected() {
        let mut c = coupon(DiscountType::Fixed, dec!(50));
        c.min_booking_amount = Some(dec!(500));
        let err = apply(&c, dec!(499), Utc::now()).unwrap_err();
        assert!(matches!(err, CouponError::BelowMinimum { .. }));
        // Exactly the minimum passes.
        assert!(apply(&c, dec!(500), Utc::now()).is_ok());
    }

    #[test]
    fn outside_validity_window_is_expired() {
        let mut c = coupon(DiscountType::Fixed, dec!(50));
        c.valid_from = Utc::now() + Duration::days(1);
        c.valid_until = Utc::now() + Duration::days(2);
        assert!(matches!(
            apply(&c, dec!(100), Utc::now()).unwrap_err(),
            CouponError::Expired(_)
        ));
    }

    #[test]
    fn usage_limit_is_enforced() {
        let mut c = coupon(DiscountType::Fixed, dec!(50));
        c.usage_limit = Some(3);
        c.usage_count = 3;
        assert!(matches!(
            apply(&c, dec!(100), Utc::now()).unwrap_err(),
            CouponError::UsageExceeded(_)
        ));
    }
}
