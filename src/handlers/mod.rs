//! HTTP surface: route table and request handlers.

pub mod checkout;
pub mod providers;

use std::time::Duration;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::AppState;

pub fn routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/providers/:id/availability", get(providers::get_availability))
        .route("/providers/:id/coupons", get(providers::list_coupons))
        .route("/customers/:id", get(providers::get_customer))
        .route("/checkout/price", post(checkout::price_draft))
        .route("/checkout", post(checkout::submit))
        .route(
            "/checkout/:id/gateway/callback",
            post(checkout::gateway_callback),
        )
        .route(
            "/checkout/:id/direct-transfer/confirm",
            post(checkout::confirm_direct_transfer),
        )
        .route("/checkout/:id/abandon", post(checkout::abandon));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
