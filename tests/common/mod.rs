use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use slotbook_api::catalog::{
    DirectTransferHandle, GatewayCredentials, InMemoryCatalog, PaymentChannelConfig, TaxSettings,
};
use slotbook_api::config::AppConfig;
use slotbook_api::events;
use slotbook_api::models::{
    Coupon, DaySchedule, DiscountType, ScheduleTemplate, SlotTemplate, TaxMode, Weekday,
};
use slotbook_api::services::checkout::{CheckoutOrchestrator, InProcessGateway};
use slotbook_api::services::{
    AvailabilityExpander, BookingWindowPolicy, CapacityTracker, CouponValidator,
};
use slotbook_api::{handlers, AppState};

pub const GATEWAY_SECRET: &str = "test_gateway_secret";

/// Helper harness wiring the full application state around an in-memory
/// catalog.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub catalog: Arc<InMemoryCatalog>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::default();

        let (event_sender, receiver) = events::channel(cfg.event_buffer);
        let event_task = tokio::spawn(events::process_events(receiver));

        let catalog = InMemoryCatalog::new();
        let catalog_service: Arc<dyn slotbook_api::catalog::CatalogService> = catalog.clone();
        let identity: Arc<dyn slotbook_api::catalog::IdentityService> = catalog.clone();
        let capacity = Arc::new(CapacityTracker::new());
        let policy = BookingWindowPolicy::new(cfg.advance_horizon_days);
        let checkout = Arc::new(CheckoutOrchestrator::new(
            catalog_service.clone(),
            capacity.clone(),
            policy,
            Arc::new(InProcessGateway),
            event_sender.clone(),
            cfg.payment_wait_secs,
            cfg.utc_offset_minutes,
            cfg.currency.clone(),
        ));

        let state = AppState {
            config: cfg,
            event_sender,
            catalog: catalog_service.clone(),
            identity,
            expander: AvailabilityExpander::new(),
            policy,
            capacity,
            coupons: Arc::new(CouponValidator::new(catalog_service)),
            checkout,
        };

        let router = handlers::routes(state.clone());
        Self {
            router,
            state,
            catalog,
            _event_task: event_task,
        }
    }

    /// Seeds a provider open every day with two slots (capacities 1 and 3)
    /// and all payment channels enabled. Returns the provider id.
    pub fn seed_provider(&self) -> Uuid {
        let provider_id = Uuid::new_v4();
        self.catalog.upsert_template(every_day_template(provider_id));
        self.seed_channels(provider_id);
        provider_id
    }

    /// Enables every payment channel and zero-rate inclusive tax for a
    /// provider whose template is seeded separately.
    pub fn seed_channels(&self, provider_id: Uuid) {
        self.catalog.set_payment_channels(
            provider_id,
            PaymentChannelConfig {
                pay_on_arrival: true,
                gateway: Some(GatewayCredentials {
                    key_id: "key_test".into(),
                    key_secret: GATEWAY_SECRET.into(),
                }),
                direct_transfer: Some(DirectTransferHandle {
                    vpa: "clinic@upi".into(),
                    payee_name: "Test Clinic".into(),
                }),
            },
        );
        self.catalog.set_tax_settings(
            provider_id,
            TaxSettings {
                mode: TaxMode::Inclusive,
                rate: dec!(0),
            },
        );
    }

    pub fn seed_coupon(&self, provider_id: Uuid, code: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.catalog.add_coupon(Coupon {
            id,
            provider_id,
            code: code.to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: dec!(50),
            min_booking_amount: None,
            usage_limit: None,
            usage_count: 0,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: Utc::now() + Duration::days(30),
        });
        id
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request build");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collect");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }
}

/// A template with the same two slots every day of the week. `batch-a` holds
/// a single token, `batch-b` holds three.
pub fn every_day_template(provider_id: Uuid) -> ScheduleTemplate {
    let slots = vec![
        SlotTemplate {
            from: "09:00".parse().unwrap(),
            to: "09:30".parse().unwrap(),
            enabled: true,
            capacity: Some(1),
            batch_id: "batch-a".into(),
        },
        SlotTemplate {
            from: "10:00".parse().unwrap(),
            to: "10:30".parse().unwrap(),
            enabled: true,
            capacity: Some(3),
            batch_id: "batch-b".into(),
        },
    ];
    let mut weekly = BTreeMap::new();
    for day in [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ] {
        weekly.insert(
            day,
            DaySchedule {
                enabled: true,
                slots: slots.clone(),
            },
        );
    }
    ScheduleTemplate {
        provider_id,
        weekly,
        leave_dates: Default::default(),
        capacity_default: 2,
        operating_window: None,
    }
}

/// Draft body for one token in `batch-a` tomorrow, as the HTTP API takes it.
pub fn draft_json(provider_id: Uuid, customer_id: Uuid, quantity: u32) -> Value {
    let date = (Utc::now() + Duration::days(1)).date_naive();
    json!({
        "provider_id": provider_id,
        "customer_id": customer_id,
        "date": date,
        "slot": {
            "from": "09:00",
            "to": "09:30",
            "enabled": true,
            "capacity": 1,
            "batch_id": "batch-a",
            "booked": 0
        },
        "line_items": [
            { "name": "Consultation", "unit_price": "500", "quantity": quantity }
        ],
        "applied_coupon": null
    })
}
