use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::time::TimeParseError;

/// Error body returned on every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Conflict", "Bad Request").
    pub error: String,
    /// Human-readable description.
    pub message: String,
    /// Machine-readable code the UI keys retry/re-entry behavior on.
    pub code: String,
    /// ISO 8601 timestamp when the error occurred.
    pub timestamp: String,
}

/// Capacity reservation failures. Surfaced distinctly from validation errors
/// so the UI prompts slot re-selection rather than form re-entry.
#[derive(Debug, Clone, thiserror::Error, Serialize, PartialEq, Eq)]
pub enum CapacityError {
    #[error("requested {requested} tokens but only {remaining} remain")]
    InsufficientCapacity { requested: u32, remaining: u32 },

    #[error("reservation quantity must be at least 1, got {0}")]
    InvalidQuantity(u32),
}

/// Coupon validation failures; all locally recoverable.
#[derive(Debug, Clone, thiserror::Error, Serialize, PartialEq, Eq)]
pub enum CouponError {
    #[error("coupon code {0} not found")]
    NotFound(String),

    #[error("order total {total} is below the coupon minimum of {minimum}")]
    BelowMinimum { minimum: String, total: String },

    #[error("coupon code {0} is outside its validity window")]
    Expired(String),

    #[error("coupon code {0} has reached its usage limit")]
    UsageExceeded(String),
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),

    /// Lost the race for the slot between render and submission.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Pricing or capacity changed since the draft was priced; the caller
    /// must re-price rather than proceed with outdated numbers.
    #[error("Stale draft: {0}")]
    StaleDraft(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Payment gateway not configured: {0}")]
    GatewayNotConfigured(String),

    #[error("Order creation failed: {0}")]
    OrderCreationFailed(String),

    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<TimeParseError> for ServiceError {
    fn from(err: TimeParseError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl ServiceError {
    /// Stable machine-readable code per variant.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::InvalidOperation(_) => "invalid_operation",
            ServiceError::Capacity(CapacityError::InsufficientCapacity { .. }) => {
                "insufficient_capacity"
            }
            ServiceError::Capacity(CapacityError::InvalidQuantity(_)) => "invalid_quantity",
            ServiceError::Coupon(CouponError::NotFound(_)) => "coupon_not_found",
            ServiceError::Coupon(CouponError::BelowMinimum { .. }) => "coupon_below_minimum",
            ServiceError::Coupon(CouponError::Expired(_)) => "coupon_expired",
            ServiceError::Coupon(CouponError::UsageExceeded(_)) => "coupon_usage_exceeded",
            ServiceError::CapacityExceeded(_) => "capacity_exceeded",
            ServiceError::StaleDraft(_) => "stale_draft",
            ServiceError::GatewayUnavailable(_) => "gateway_unavailable",
            ServiceError::GatewayNotConfigured(_) => "gateway_not_configured",
            ServiceError::OrderCreationFailed(_) => "order_creation_failed",
            ServiceError::VerificationFailed(_) => "verification_failed",
            ServiceError::ExternalServiceError(_) => "external_service_error",
            ServiceError::InternalError(_) => "internal_error",
        }
    }

    /// True for external-channel failures the UI should offer a retry for,
    /// preserving the draft.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::GatewayUnavailable(_)
                | ServiceError::OrderCreationFailed(_)
                | ServiceError::ExternalServiceError(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            // Input/validation: user-correctable, never fatal.
            ServiceError::ValidationError(_)
            | ServiceError::InvalidInput(_)
            | ServiceError::Capacity(CapacityError::InvalidQuantity(_))
            | ServiceError::Coupon(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            // Capacity/timing races: the UI should prompt re-selection.
            ServiceError::Capacity(CapacityError::InsufficientCapacity { .. })
            | ServiceError::CapacityExceeded(_)
            | ServiceError::StaleDraft(_) => StatusCode::CONFLICT,
            // External-channel failures: retryable, draft preserved.
            ServiceError::GatewayUnavailable(_)
            | ServiceError::OrderCreationFailed(_)
            | ServiceError::VerificationFailed(_)
            | ServiceError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            ServiceError::GatewayNotConfigured(_) => StatusCode::CONFLICT,
            ServiceError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: self.to_string(),
            code: self.code().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        if status.is_server_error() {
            tracing::error!(code = body.code, "request failed: {}", body.message);
        } else {
            tracing::debug!(code = body.code, "request rejected: {}", body.message);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn race_errors_map_to_conflict() {
        assert_eq!(
            ServiceError::StaleDraft("totals changed".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Capacity(CapacityError::InsufficientCapacity {
                requested: 2,
                remaining: 0,
            })
            .status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn external_failures_are_retryable() {
        assert!(ServiceError::GatewayUnavailable("script".into()).is_retryable());
        assert!(!ServiceError::VerificationFailed("bad signature".into()).is_retryable());
        assert!(!ServiceError::ValidationError("x".into()).is_retryable());
    }

    #[test]
    fn coupon_errors_are_user_correctable() {
        let err = ServiceError::Coupon(CouponError::NotFound("SAVE10".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "coupon_not_found");
    }
}
