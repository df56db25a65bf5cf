//! Provider-facing reads: the availability calendar and coupon listing.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DiscountType, TimeOfDay};
use crate::services::availability::NEXT_SLOT_SCAN_DAYS;
use crate::services::booking_window::{NotBookableReason, SlotWarning};
use crate::services::CapacityTracker;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub from: Option<NaiveDate>,
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SlotView {
    pub from: TimeOfDay,
    pub to: TimeOfDay,
    pub batch_id: String,
    pub enabled: bool,
    pub capacity: u32,
    pub booked: u32,
    pub remaining: u32,
    pub bookable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NotBookableReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<SlotWarning>,
}

#[derive(Debug, Serialize)]
pub struct DayView {
    pub date: NaiveDate,
    pub is_leave_day: bool,
    pub enabled: bool,
    pub all_slots_full: bool,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Serialize)]
pub struct NextSlotView {
    pub date: NaiveDate,
    pub from: TimeOfDay,
    pub to: TimeOfDay,
    pub batch_id: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub provider_id: Uuid,
    pub from: NaiveDate,
    pub window_days: u32,
    pub available_days: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_available: Option<NextSlotView>,
    pub days: Vec<DayView>,
}

/// Expanded, booked-annotated, bookability-evaluated calendar window.
///
/// The next-opening hint scans further ahead than the rendered window so a
/// fully-booked month still points the customer somewhere.
pub async fn get_availability(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<AvailabilityResponse> {
    let window_days = query
        .days
        .unwrap_or(state.config.expansion_window_days)
        .clamp(1, 366);
    // Providers' wall clock, not UTC; the cutoffs are local.
    let now = (Utc::now() + Duration::minutes(i64::from(state.config.utc_offset_minutes)))
        .naive_utc();
    let today = now.date();
    let from = query.from.unwrap_or(today);

    let template = state.catalog.schedule_template(provider_id).await?;
    let scan_days = window_days.max(NEXT_SLOT_SCAN_DAYS);
    let mut expanded = state.expander.expand(&template, from, scan_days);
    let counts = state
        .catalog
        .booking_counts(provider_id, from, scan_days)
        .await?;
    for day in &mut expanded {
        CapacityTracker::annotate(day, &counts);
    }

    let next_available = state
        .expander
        .next_available_slot(&expanded)
        .map(|(date, slot)| NextSlotView {
            date,
            from: slot.from,
            to: slot.to,
            batch_id: slot.batch_id.clone(),
        });

    let window = &expanded[..window_days as usize];
    let available_days = state.expander.available_days_count(window);
    let days = window
        .iter()
        .map(|day| DayView {
            date: day.date,
            is_leave_day: day.is_leave_day,
            enabled: day.enabled,
            all_slots_full: day.all_slots_full(),
            slots: day
                .slots
                .iter()
                .map(|slot| {
                    let decision = slot.enabled.then(|| {
                        state
                            .policy
                            .evaluate(now, day.date, slot, template.operating_window)
                    });
                    SlotView {
                        from: slot.from,
                        to: slot.to,
                        batch_id: slot.batch_id.clone(),
                        enabled: slot.enabled,
                        capacity: slot.capacity,
                        booked: slot.booked,
                        remaining: slot.remaining(),
                        bookable: decision.map(|d| d.bookable).unwrap_or(false),
                        reason: decision.and_then(|d| d.reason),
                        warning: decision.and_then(|d| d.warning),
                    }
                })
                .collect(),
        })
        .collect();

    Ok(Json(ApiResponse::success(AvailabilityResponse {
        provider_id,
        from,
        window_days,
        available_days,
        next_available,
        days,
    })))
}

#[derive(Debug, Serialize)]
pub struct CouponView {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_booking_amount: Option<Decimal>,
    pub valid_until: chrono::DateTime<Utc>,
}

/// Customer profile for pre-filling a draft's contact fields.
pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> ApiResult<crate::catalog::CustomerProfile> {
    let profile = state.identity.customer_profile(customer_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// Coupons currently redeemable against this provider.
pub async fn list_coupons(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> ApiResult<Vec<CouponView>> {
    let coupons = state
        .coupons
        .list_active(provider_id)
        .await?
        .into_iter()
        .map(|c| CouponView {
            code: c.code,
            discount_type: c.discount_type,
            discount_value: c.discount_value,
            min_booking_amount: c.min_booking_amount,
            valid_until: c.valid_until,
        })
        .collect();
    Ok(Json(ApiResponse::success(coupons)))
}
