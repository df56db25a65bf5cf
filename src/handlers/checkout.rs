//! Checkout endpoints: pricing, submission, payment callbacks.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Booking, DraftReservation, PaymentChannelKind, PricedDraft};
use crate::services::checkout::ChannelInitiation;
use crate::{ApiResponse, ApiResult, AppState};

/// Recomputes totals for a draft. Clients call this after every draft
/// mutation; totals are never patched incrementally on their side either.
pub async fn price_draft(
    State(state): State<AppState>,
    Json(draft): Json<DraftReservation>,
) -> ApiResult<PricedDraft> {
    let priced = state.checkout.price_draft(&draft).await?;
    Ok(Json(ApiResponse::success(priced)))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub draft: DraftReservation,
    /// Totals as the customer last saw them; submission aborts if they are
    /// stale.
    pub priced: PricedDraft,
    pub channel: PaymentChannelKind,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub session_id: Uuid,
    pub initiation: ChannelInitiation,
}

pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<SubmitResponse> {
    let (session_id, initiation) = state
        .checkout
        .submit(request.draft, &request.priced, request.channel)
        .await?;
    Ok(Json(ApiResponse::success(SubmitResponse {
        session_id,
        initiation,
    })))
}

#[derive(Debug, Deserialize)]
pub struct GatewayCallback {
    pub payment_reference: String,
    pub signature: String,
}

pub async fn gateway_callback(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(callback): Json<GatewayCallback>,
) -> ApiResult<Booking> {
    let booking = state
        .checkout
        .complete_gateway(session_id, &callback.payment_reference, &callback.signature)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn confirm_direct_transfer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Booking> {
    let booking = state.checkout.confirm_direct_transfer(session_id).await?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn abandon(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<&'static str> {
    state.checkout.abandon(session_id).await?;
    Ok(Json(ApiResponse::success("cancelled")))
}
