//! Boundary to the external Catalog and Identity services.
//!
//! The catalog owns schedule templates, coupons, payment-channel
//! configuration, and booking durability; this core consumes them through
//! `CatalogService` and hands confirmed bookings back through it. All lenient
//! parsing of loosely-typed source data (weekday keys in mixed casing, time
//! strings in either clock format, leave timestamps with time components)
//! happens here, never inside the core.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    Booking, Coupon, DaySchedule, PaymentChannelKind, ScheduleTemplate, SlotTemplate, TaxMode,
    TimeOfDay, Weekday,
};

/// Credentials for the hosted gateway-redirect channel. The wire protocol
/// behind them is an external contract; this core only threads the key pair
/// through to order creation and callback verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCredentials {
    pub key_id: String,
    pub key_secret: String,
}

/// Receiving handle for the direct-transfer (scan-to-pay) channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectTransferHandle {
    pub vpa: String,
    pub payee_name: String,
}

/// Which payment channels a provider has enabled/configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentChannelConfig {
    pub pay_on_arrival: bool,
    pub gateway: Option<GatewayCredentials>,
    pub direct_transfer: Option<DirectTransferHandle>,
}

impl PaymentChannelConfig {
    pub fn enabled_channels(&self) -> Vec<PaymentChannelKind> {
        let mut channels = Vec::new();
        if self.gateway.is_some() {
            channels.push(PaymentChannelKind::GatewayRedirect);
        }
        if self.direct_transfer.is_some() {
            channels.push(PaymentChannelKind::DirectTransfer);
        }
        if self.pay_on_arrival {
            channels.push(PaymentChannelKind::PayOnArrival);
        }
        channels
    }

    pub fn supports(&self, kind: PaymentChannelKind) -> bool {
        self.enabled_channels().contains(&kind)
    }
}

/// Provider tax settings applied when pricing a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSettings {
    pub mode: TaxMode,
    pub rate: Decimal,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            mode: TaxMode::Inclusive,
            rate: Decimal::ZERO,
        }
    }
}

/// Aggregated existing-booking quantity for one `(date, batch_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCount {
    pub date: NaiveDate,
    pub batch_id: String,
    pub quantity: u32,
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn schedule_template(&self, provider_id: Uuid) -> Result<ScheduleTemplate, ServiceError>;

    /// Existing bookings per `(date, batch_id)` for a forward window.
    async fn booking_counts(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        days: u32,
    ) -> Result<Vec<BookingCount>, ServiceError>;

    async fn payment_channels(
        &self,
        provider_id: Uuid,
    ) -> Result<PaymentChannelConfig, ServiceError>;

    async fn tax_settings(&self, provider_id: Uuid) -> Result<TaxSettings, ServiceError>;

    async fn find_coupon(
        &self,
        provider_id: Uuid,
        code: &str,
    ) -> Result<Option<Coupon>, ServiceError>;

    async fn list_active_coupons(&self, provider_id: Uuid) -> Result<Vec<Coupon>, ServiceError>;

    /// Called after a confirmed booking; keeps usage limits honest.
    async fn increment_coupon_usage(&self, coupon_id: Uuid) -> Result<(), ServiceError>;

    /// Point of durability: hands a finished booking to the catalog/ledger.
    async fn record_booking(&self, booking: &Booking) -> Result<(), ServiceError>;
}

/// Authenticated customer identity used to pre-fill drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn customer_profile(&self, customer_id: Uuid)
        -> Result<CustomerProfile, ServiceError>;
}

// ---------------------------------------------------------------------------
// Raw schedule ingestion
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Slot as it arrives from the catalog: string times, optional per-slot token
/// count.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSlot {
    pub from: String,
    pub to: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, alias = "token")]
    pub capacity: Option<u32>,
    pub batch_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDaySchedule {
    pub enabled: bool,
    #[serde(default)]
    pub slots: Vec<RawSlot>,
}

/// Weekly template as the catalog stores it: weekday keys are abbreviated
/// strings with inconsistent casing, leave dates may carry time components.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScheduleTemplate {
    pub provider_id: Uuid,
    pub weekly: HashMap<String, RawDaySchedule>,
    #[serde(default)]
    pub leave_dates: Vec<String>,
    #[serde(alias = "token_limit")]
    pub capacity_default: u32,
    #[serde(default)]
    pub operating_window_from: Option<String>,
    #[serde(default)]
    pub operating_window_to: Option<String>,
}

/// Parses one leave-date entry, discarding any time-of-day component.
fn parse_leave_date(raw: &str) -> Result<NaiveDate, ServiceError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    // Date prefix of a "YYYY-MM-DD HH:MM:SS" style timestamp.
    if trimmed.len() >= 10 {
        if let Ok(date) = NaiveDate::parse_from_str(&trimmed[..10], "%Y-%m-%d") {
            return Ok(date);
        }
    }
    Err(ServiceError::ValidationError(format!(
        "unparseable leave date: {raw}"
    )))
}

/// Converts a raw catalog template into the typed form, rejecting unknown
/// weekday keys, malformed times, and non-positive-duration slots.
pub fn ingest_schedule(raw: RawScheduleTemplate) -> Result<ScheduleTemplate, ServiceError> {
    let mut weekly: BTreeMap<Weekday, DaySchedule> = BTreeMap::new();
    for (key, raw_day) in raw.weekly {
        let weekday = Weekday::parse_lenient(&key).ok_or_else(|| {
            ServiceError::ValidationError(format!("unknown weekday key: {key}"))
        })?;
        let mut slots = Vec::with_capacity(raw_day.slots.len());
        for raw_slot in raw_day.slots {
            let from: TimeOfDay = raw_slot.from.parse()?;
            let to: TimeOfDay = raw_slot.to.parse()?;
            slots.push(SlotTemplate {
                from,
                to,
                enabled: raw_slot.enabled,
                capacity: raw_slot.capacity,
                batch_id: raw_slot.batch_id,
            });
        }
        if weekly
            .insert(weekday, DaySchedule { enabled: raw_day.enabled, slots })
            .is_some()
        {
            return Err(ServiceError::ValidationError(format!(
                "duplicate weekday key: {key}"
            )));
        }
    }

    let mut leave_dates = BTreeSet::new();
    for raw_date in &raw.leave_dates {
        leave_dates.insert(parse_leave_date(raw_date)?);
    }

    let operating_window = match (raw.operating_window_from, raw.operating_window_to) {
        (Some(from), Some(to)) => Some((from.parse::<TimeOfDay>()?, to.parse::<TimeOfDay>()?)),
        (None, None) => None,
        _ => {
            return Err(ServiceError::ValidationError(
                "operating window requires both a start and an end".to_string(),
            ))
        }
    };

    let template = ScheduleTemplate {
        provider_id: raw.provider_id,
        weekly,
        leave_dates,
        capacity_default: raw.capacity_default,
        operating_window,
    };
    template.validate()?;
    Ok(template)
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-process catalog backing the binary and the test harness.
#[derive(Default)]
pub struct InMemoryCatalog {
    templates: DashMap<Uuid, ScheduleTemplate>,
    channels: DashMap<Uuid, PaymentChannelConfig>,
    tax: DashMap<Uuid, TaxSettings>,
    coupons: DashMap<Uuid, Coupon>,
    bookings: DashMap<Uuid, Vec<Booking>>,
    customers: DashMap<Uuid, CustomerProfile>,
}

impl InMemoryCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn upsert_template(&self, template: ScheduleTemplate) {
        self.templates.insert(template.provider_id, template);
    }

    pub fn set_payment_channels(&self, provider_id: Uuid, config: PaymentChannelConfig) {
        self.channels.insert(provider_id, config);
    }

    pub fn set_tax_settings(&self, provider_id: Uuid, settings: TaxSettings) {
        self.tax.insert(provider_id, settings);
    }

    pub fn add_coupon(&self, coupon: Coupon) {
        self.coupons.insert(coupon.id, coupon);
    }

    pub fn add_customer(&self, profile: CustomerProfile) {
        self.customers.insert(profile.customer_id, profile);
    }

    pub fn bookings_for(&self, provider_id: Uuid) -> Vec<Booking> {
        self.bookings
            .get(&provider_id)
            .map(|b| b.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn schedule_template(&self, provider_id: Uuid) -> Result<ScheduleTemplate, ServiceError> {
        self.templates
            .get(&provider_id)
            .map(|t| t.clone())
            .ok_or_else(|| {
                ServiceError::NotFound(format!("schedule template for provider {provider_id}"))
            })
    }

    async fn booking_counts(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        days: u32,
    ) -> Result<Vec<BookingCount>, ServiceError> {
        let until = from + chrono::Duration::days(i64::from(days));
        let mut counts: HashMap<(NaiveDate, String), u32> = HashMap::new();
        if let Some(bookings) = self.bookings.get(&provider_id) {
            for booking in bookings.iter() {
                if booking.date >= from && booking.date < until {
                    let quantity: u32 = booking.line_items.iter().map(|li| li.quantity).sum();
                    *counts
                        .entry((booking.date, booking.batch_id.clone()))
                        .or_default() += quantity;
                }
            }
        }
        Ok(counts
            .into_iter()
            .map(|((date, batch_id), quantity)| BookingCount {
                date,
                batch_id,
                quantity,
            })
            .collect())
    }

    async fn payment_channels(
        &self,
        provider_id: Uuid,
    ) -> Result<PaymentChannelConfig, ServiceError> {
        Ok(self
            .channels
            .get(&provider_id)
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn tax_settings(&self, provider_id: Uuid) -> Result<TaxSettings, ServiceError> {
        Ok(self
            .tax
            .get(&provider_id)
            .map(|t| t.clone())
            .unwrap_or_default())
    }

    async fn find_coupon(
        &self,
        provider_id: Uuid,
        code: &str,
    ) -> Result<Option<Coupon>, ServiceError> {
        let needle = code.trim().to_ascii_uppercase();
        Ok(self.coupons.iter().find_map(|entry| {
            let coupon = entry.value();
            (coupon.provider_id == provider_id && coupon.code.to_ascii_uppercase() == needle)
                .then(|| coupon.clone())
        }))
    }

    async fn list_active_coupons(&self, provider_id: Uuid) -> Result<Vec<Coupon>, ServiceError> {
        let now = chrono::Utc::now();
        Ok(self
            .coupons
            .iter()
            .filter(|entry| {
                let c = entry.value();
                c.provider_id == provider_id && c.is_within_validity(now) && !c.usage_exhausted()
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn increment_coupon_usage(&self, coupon_id: Uuid) -> Result<(), ServiceError> {
        let mut coupon = self
            .coupons
            .get_mut(&coupon_id)
            .ok_or_else(|| ServiceError::NotFound(format!("coupon {coupon_id}")))?;
        coupon.usage_count += 1;
        Ok(())
    }

    async fn record_booking(&self, booking: &Booking) -> Result<(), ServiceError> {
        self.bookings
            .entry(booking.provider_id)
            .or_default()
            .push(booking.clone());
        Ok(())
    }
}

#[async_trait]
impl IdentityService for InMemoryCatalog {
    async fn customer_profile(
        &self,
        customer_id: Uuid,
    ) -> Result<CustomerProfile, ServiceError> {
        self.customers
            .get(&customer_id)
            .map(|c| c.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("customer {customer_id}")))
    }
}
