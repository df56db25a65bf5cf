//! Slotbook API Library
//!
//! This crate provides the availability, capacity, and checkout core for the
//! Slotbook booking API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::response::Json;
use chrono::Utc;
use serde::Serialize;

use catalog::{CatalogService, IdentityService};
use services::checkout::CheckoutOrchestrator;
use services::{AvailabilityExpander, BookingWindowPolicy, CapacityTracker, CouponValidator};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub catalog: Arc<dyn CatalogService>,
    pub identity: Arc<dyn IdentityService>,
    pub expander: AvailabilityExpander,
    pub policy: BookingWindowPolicy,
    pub capacity: Arc<CapacityTracker>,
    pub coupons: Arc<CouponValidator>,
    pub checkout: Arc<CheckoutOrchestrator>,
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_carries_data() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        assert!(response.message.is_none());
    }

    #[test]
    fn error_response_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
