//! Checkout orchestration: drives a priced draft through reservation,
//! payment, and booking hand-off.
//!
//! Sessions move strictly forward: Drafting, AwaitingPayment, Verifying,
//! then one of Confirmed, Failed, or Cancelled. Every path out of
//! AwaitingPayment or Verifying that does not confirm releases the capacity
//! reservation exactly once. A confirmed booking is never downgraded.

pub mod channels;
pub mod gateway;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::errors::{CapacityError, CouponError, ServiceError};
use crate::events::{Event, EventSender};
use crate::models::{
    Booking, DraftReservation, ExpandedSlot, PaymentChannelKind, PaymentState, PricedDraft,
};
use crate::services::booking_window::BookingWindowPolicy;
use crate::services::capacity::{CapacityTracker, Reservation, SlotKey};
use crate::services::coupons;
use crate::services::pricing::PricingEngine;

pub use channels::{ChannelInitiation, DirectTransferRequest};
pub use gateway::{GatewayClient, InProcessGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Drafting,
    AwaitingPayment,
    Verifying,
    Confirmed,
    Failed,
    Cancelled,
}

#[derive(Clone)]
pub struct CheckoutSession {
    pub session_id: Uuid,
    /// Booking id fixed at submission so the direct-transfer note can carry
    /// it before the booking record exists.
    pub booking_id: Uuid,
    pub state: CheckoutState,
    pub draft: DraftReservation,
    pub priced: PricedDraft,
    pub channel: PaymentChannelKind,
    pub reservation: Option<Reservation>,
    pub order_handle: Option<String>,
    pub coupon_id: Option<Uuid>,
    pub booking: Option<Booking>,
    pub created_at: DateTime<Utc>,
}

pub struct CheckoutOrchestrator {
    catalog: Arc<dyn CatalogService>,
    capacity: Arc<CapacityTracker>,
    pricing: PricingEngine,
    policy: BookingWindowPolicy,
    gateway: Arc<dyn GatewayClient>,
    events: EventSender,
    sessions: DashMap<Uuid, CheckoutSession>,
    payment_wait: Duration,
    /// Offset from UTC of the providers' wall clock; bookability cutoffs are
    /// evaluated in that clock.
    utc_offset: Duration,
    currency: String,
}

impl CheckoutOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        capacity: Arc<CapacityTracker>,
        policy: BookingWindowPolicy,
        gateway: Arc<dyn GatewayClient>,
        events: EventSender,
        payment_wait_secs: u64,
        utc_offset_minutes: i32,
        currency: String,
    ) -> Self {
        Self {
            catalog,
            capacity,
            pricing: PricingEngine::new(),
            policy,
            gateway,
            events,
            sessions: DashMap::new(),
            payment_wait: Duration::seconds(payment_wait_secs as i64),
            utc_offset: Duration::minutes(i64::from(utc_offset_minutes)),
            currency,
        }
    }

    /// Prices a draft from current catalog state. Also the re-pricing step
    /// submission uses to detect stale client totals.
    pub async fn price_draft(&self, draft: &DraftReservation) -> Result<PricedDraft, ServiceError> {
        let tax = self.catalog.tax_settings(draft.provider_id).await?;
        let coupon = match &draft.applied_coupon {
            Some(applied) => Some(self.revalidate_coupon(draft, &applied.code).await?.1),
            None => None,
        };
        Ok(self.pricing.price(&draft.line_items, &tax, coupon.as_ref()))
    }

    async fn revalidate_coupon(
        &self,
        draft: &DraftReservation,
        code: &str,
    ) -> Result<(Uuid, crate::models::CouponApplication), ServiceError> {
        let coupon = self
            .catalog
            .find_coupon(draft.provider_id, code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.to_string()))?;
        let application = coupons::apply(&coupon, draft.subtotal(), Utc::now())?;
        Ok((coupon.id, application))
    }

    /// Submits a draft for checkout: re-validates, re-prices, reserves
    /// capacity, and dispatches to the chosen channel.
    ///
    /// `client_priced` is the totals the customer saw; any difference from
    /// the fresh pricing aborts with `StaleDraft` before capacity is touched.
    #[instrument(skip(self, draft, client_priced), fields(provider_id = %draft.provider_id))]
    pub async fn submit(
        &self,
        draft: DraftReservation,
        client_priced: &PricedDraft,
        channel: PaymentChannelKind,
    ) -> Result<(Uuid, ChannelInitiation), ServiceError> {
        let config = self.catalog.payment_channels(draft.provider_id).await?;
        if !config.supports(channel) {
            return Err(match channel {
                PaymentChannelKind::GatewayRedirect => ServiceError::GatewayNotConfigured(
                    "provider has no gateway credentials".to_string(),
                ),
                _ => ServiceError::InvalidOperation(format!(
                    "payment channel {channel:?} is not enabled for this provider"
                )),
            });
        }

        let template = self.catalog.schedule_template(draft.provider_id).await?;
        if template.leave_dates.contains(&draft.date) {
            return Err(ServiceError::InvalidOperation(format!(
                "provider is on leave on {}",
                draft.date
            )));
        }
        // The client echoes the slot it selected; schedule, enablement, and
        // capacity all come from the template, not from the echo.
        let weekday = crate::models::Weekday::from(chrono::Datelike::weekday(&draft.date));
        let not_scheduled = || {
            ServiceError::NotFound(format!(
                "slot {} is not scheduled on {}",
                draft.slot.batch_id, draft.date
            ))
        };
        let day = template.weekly.get(&weekday).ok_or_else(not_scheduled)?;
        let slot_template = day
            .slots
            .iter()
            .find(|s| s.batch_id == draft.slot.batch_id)
            .ok_or_else(not_scheduled)?;
        if !day.enabled || !slot_template.enabled {
            return Err(ServiceError::InvalidOperation(format!(
                "slot {} is not open for booking on {}",
                draft.slot.batch_id, draft.date
            )));
        }
        let slot_capacity = template.slot_capacity(slot_template);

        let key = SlotKey {
            provider_id: draft.provider_id,
            date: draft.date,
            batch_id: slot_template.batch_id.clone(),
        };
        let booked_seed: u32 = self
            .catalog
            .booking_counts(draft.provider_id, draft.date, 1)
            .await?
            .iter()
            .filter(|c| c.batch_id == key.batch_id)
            .map(|c| c.quantity)
            .sum();
        let slot = ExpandedSlot {
            from: slot_template.from,
            to: slot_template.to,
            enabled: true,
            capacity: slot_capacity,
            batch_id: slot_template.batch_id.clone(),
            booked: booked_seed,
        };
        let decision = self.policy.evaluate(
            (Utc::now() + self.utc_offset).naive_utc(),
            draft.date,
            &slot,
            template.operating_window,
        );
        if let Some(reason) = decision.reason {
            return Err(ServiceError::InvalidOperation(format!(
                "slot is not bookable: {reason:?}"
            )));
        }

        let tax = self.catalog.tax_settings(draft.provider_id).await?;
        let coupon = match &draft.applied_coupon {
            Some(applied) => Some(self.revalidate_coupon(&draft, &applied.code).await?),
            None => None,
        };
        let priced = self.pricing.price(
            &draft.line_items,
            &tax,
            coupon.as_ref().map(|(_, a)| a),
        );
        if priced != *client_priced {
            return Err(ServiceError::StaleDraft(
                "totals changed since the draft was priced".to_string(),
            ));
        }

        let reservation = match self.capacity.try_reserve(
            key,
            slot_capacity,
            booked_seed,
            draft.token_quantity(),
        ) {
            Ok(r) => r,
            Err(CapacityError::InsufficientCapacity { requested, remaining }) => {
                return Err(ServiceError::CapacityExceeded(format!(
                    "requested {requested} tokens but only {remaining} remain"
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let session_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        self.events
            .send(Event::CheckoutStarted {
                session_id,
                provider_id: draft.provider_id,
                channel,
            })
            .await;
        self.events
            .send(Event::SlotReserved {
                provider_id: draft.provider_id,
                date: draft.date,
                batch_id: reservation.key.batch_id.clone(),
                quantity: reservation.quantity,
            })
            .await;
        if let Some((_, application)) = &coupon {
            self.events
                .send(Event::CouponApplied {
                    code: application.code.clone(),
                    customer_id: draft.customer_id,
                    discount_amount: application.discount_amount.to_string(),
                })
                .await;
        }

        let mut session = CheckoutSession {
            session_id,
            booking_id,
            state: CheckoutState::Drafting,
            draft,
            priced,
            channel,
            reservation: Some(reservation),
            order_handle: None,
            coupon_id: coupon.map(|(id, _)| id),
            booking: None,
            created_at: Utc::now(),
        };

        let initiation = match channel {
            PaymentChannelKind::PayOnArrival => {
                let booking = self.build_booking(&session, PaymentState::Unpaid);
                self.record_confirmed(&mut session, booking.clone()).await?;
                ChannelInitiation::Immediate { booking }
            }
            PaymentChannelKind::DirectTransfer => {
                let handle = config.direct_transfer.ok_or_else(|| {
                    ServiceError::InvalidOperation(
                        "direct transfer enabled without a receiving handle".to_string(),
                    )
                })?;
                // The pending booking exists before any money moves; the
                // customer's later assertion only confirms the session.
                let booking =
                    self.build_booking(&session, PaymentState::PendingManualConfirmation);
                self.hand_off_booking(&mut session, booking.clone()).await?;
                session.state = CheckoutState::AwaitingPayment;
                info!(booking_id = %booking.booking_id, "pending booking created, awaiting transfer");
                ChannelInitiation::PaymentRequest {
                    request: DirectTransferRequest::build(
                        &handle,
                        session.priced.total,
                        &self.currency,
                        session.draft.customer_id,
                        booking_id,
                    ),
                    booking,
                }
            }
            PaymentChannelKind::GatewayRedirect => {
                let credentials = config.gateway.ok_or_else(|| {
                    ServiceError::GatewayNotConfigured(
                        "provider has no gateway credentials".to_string(),
                    )
                })?;
                match self.open_gateway_order(&session, &credentials).await {
                    Ok(order) => {
                        session.state = CheckoutState::AwaitingPayment;
                        session.order_handle = Some(order.order_handle.clone());
                        ChannelInitiation::Redirect {
                            order_handle: order.order_handle,
                            key_id: credentials.key_id,
                            amount_minor: order.amount_minor,
                            currency: order.currency,
                        }
                    }
                    Err(e) => {
                        // Retryable failure: free the tokens, keep no session.
                        if let Some(r) = session.reservation.take() {
                            self.release(&r).await;
                        }
                        return Err(e);
                    }
                }
            }
        };

        self.sessions.insert(session_id, session);
        Ok((session_id, initiation))
    }

    async fn open_gateway_order(
        &self,
        session: &CheckoutSession,
        credentials: &crate::catalog::GatewayCredentials,
    ) -> Result<gateway::GatewayOrder, ServiceError> {
        self.gateway.ensure_available().await?;
        let amount_minor = (session.priced.total * Decimal::ONE_HUNDRED)
            .round_dp(0)
            .to_i64()
            .ok_or_else(|| {
                ServiceError::InternalError("total does not fit in minor units".to_string())
            })?;
        self.gateway
            .create_order(
                credentials,
                amount_minor,
                &self.currency,
                &gateway::new_receipt(),
            )
            .await
    }

    /// Gateway callback: verifies the payment signature and confirms or
    /// fails the session.
    #[instrument(skip(self, signature))]
    pub async fn complete_gateway(
        &self,
        session_id: Uuid,
        payment_reference: &str,
        signature: &str,
    ) -> Result<Booking, ServiceError> {
        let (order_handle, provider_id) = {
            let mut session = self
                .sessions
                .get_mut(&session_id)
                .ok_or_else(|| ServiceError::NotFound(format!("checkout session {session_id}")))?;
            if session.state != CheckoutState::AwaitingPayment
                || session.channel != PaymentChannelKind::GatewayRedirect
            {
                return Err(ServiceError::InvalidOperation(format!(
                    "session is not awaiting a gateway payment (state {:?})",
                    session.state
                )));
            }
            session.state = CheckoutState::Verifying;
            let handle = session.order_handle.clone().ok_or_else(|| {
                ServiceError::InternalError("gateway session has no order handle".to_string())
            })?;
            (handle, session.draft.provider_id)
        };

        let credentials = self
            .catalog
            .payment_channels(provider_id)
            .await?
            .gateway
            .ok_or_else(|| {
                ServiceError::GatewayNotConfigured(
                    "provider has no gateway credentials".to_string(),
                )
            })?;

        match gateway::verify_signature(
            &credentials.key_secret,
            &order_handle,
            payment_reference,
            signature,
        ) {
            Ok(()) => {
                let mut session = self.take_for_completion(session_id)?;
                let booking = self.build_booking(&session, PaymentState::Paid);
                let recorded = self.record_confirmed(&mut session, booking.clone()).await;
                self.sessions.insert(session_id, session);
                recorded?;
                self.events
                    .send(Event::PaymentVerified {
                        booking_id: booking.booking_id,
                        payment_reference: payment_reference.to_string(),
                    })
                    .await;
                Ok(booking)
            }
            Err(e) => {
                self.fail_session(session_id, "payment verification failed")
                    .await;
                Err(e)
            }
        }
    }

    /// Direct-transfer self-assertion: the customer says they have paid.
    ///
    /// The booking already exists from submission and its payment state stays
    /// `PendingManualConfirmation`; nothing here can prove money moved. The
    /// session just stops waiting.
    #[instrument(skip(self))]
    pub async fn confirm_direct_transfer(&self, session_id: Uuid) -> Result<Booking, ServiceError> {
        let booking = {
            let mut session = self
                .sessions
                .get_mut(&session_id)
                .ok_or_else(|| ServiceError::NotFound(format!("checkout session {session_id}")))?;
            if session.state != CheckoutState::AwaitingPayment
                || session.channel != PaymentChannelKind::DirectTransfer
            {
                return Err(ServiceError::InvalidOperation(format!(
                    "session is not awaiting a direct transfer (state {:?})",
                    session.state
                )));
            }
            let booking = session.booking.clone().ok_or_else(|| {
                ServiceError::InternalError(
                    "direct-transfer session lost its booking".to_string(),
                )
            })?;
            session.state = CheckoutState::Confirmed;
            booking
        };
        info!(booking_id = %booking.booking_id, "direct transfer asserted by customer");
        self.events
            .send(Event::PaymentPendingReconciliation {
                booking_id: booking.booking_id,
                asserted_at: Utc::now(),
            })
            .await;
        self.events.send(Event::BookingConfirmed(booking.booking_id)).await;
        Ok(booking)
    }

    /// Customer walked away (closed the widget, navigated back). Frees the
    /// tokens immediately instead of waiting for the timeout sweep.
    #[instrument(skip(self))]
    pub async fn abandon(&self, session_id: Uuid) -> Result<(), ServiceError> {
        let reservation = {
            let mut session = self
                .sessions
                .get_mut(&session_id)
                .ok_or_else(|| ServiceError::NotFound(format!("checkout session {session_id}")))?;
            if session.state != CheckoutState::AwaitingPayment {
                return Err(ServiceError::InvalidOperation(format!(
                    "session cannot be abandoned from state {:?}",
                    session.state
                )));
            }
            session.state = CheckoutState::Cancelled;
            session.reservation.take()
        };
        if let Some(r) = reservation {
            self.release(&r).await;
        }
        self.events
            .send(Event::CheckoutCancelled {
                session_id,
                reason: "abandoned by customer".to_string(),
            })
            .await;
        Ok(())
    }

    /// Fails sessions stuck in AwaitingPayment past the configured wait and
    /// frees their tokens. Returns how many were swept.
    ///
    /// Terminal sessions past the same cutoff are evicted so the table does
    /// not grow with completed checkouts. Sessions failed by this sweep stay
    /// queryable until the next one.
    pub async fn expire_stale_sessions(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.payment_wait;
        self.sessions.retain(|_, s| {
            !matches!(
                s.state,
                CheckoutState::Confirmed | CheckoutState::Failed | CheckoutState::Cancelled
            ) || s.created_at >= cutoff
        });
        let mut swept = Vec::new();
        for mut entry in self.sessions.iter_mut() {
            if entry.state == CheckoutState::AwaitingPayment && entry.created_at < cutoff {
                entry.state = CheckoutState::Failed;
                swept.push((entry.session_id, entry.reservation.take()));
            }
        }
        let count = swept.len();
        for (session_id, reservation) in swept {
            if let Some(r) = reservation {
                self.release(&r).await;
            }
            warn!(session_id = %session_id, "checkout timed out awaiting payment");
            self.events.send(Event::CheckoutTimedOut { session_id }).await;
        }
        count
    }

    pub fn session(&self, session_id: Uuid) -> Option<CheckoutSession> {
        self.sessions.get(&session_id).map(|s| s.clone())
    }

    fn take_for_completion(&self, session_id: Uuid) -> Result<CheckoutSession, ServiceError> {
        self.sessions
            .remove(&session_id)
            .map(|(_, s)| s)
            .ok_or_else(|| ServiceError::NotFound(format!("checkout session {session_id}")))
    }

    fn build_booking(&self, session: &CheckoutSession, payment_state: PaymentState) -> Booking {
        Booking {
            booking_id: session.booking_id,
            reference: Booking::new_reference(session.booking_id),
            provider_id: session.draft.provider_id,
            customer_id: session.draft.customer_id,
            date: session.draft.date,
            batch_id: session.draft.slot.batch_id.clone(),
            line_items: session.draft.line_items.clone(),
            total: session.priced.total,
            payment_channel: session.channel,
            payment_state,
            created_at: Utc::now(),
        }
    }

    /// Hands the booking to the catalog. The reservation is consumed, not
    /// released; its tokens are now booked.
    async fn hand_off_booking(
        &self,
        session: &mut CheckoutSession,
        booking: Booking,
    ) -> Result<(), ServiceError> {
        if let Err(e) = self.catalog.record_booking(&booking).await {
            session.state = CheckoutState::Failed;
            if let Some(r) = session.reservation.take() {
                self.release(&r).await;
            }
            self.events
                .send(Event::BookingFailed {
                    session_id: session.session_id,
                    reason: "booking hand-off failed".to_string(),
                })
                .await;
            return Err(e);
        }
        if let Some(coupon_id) = session.coupon_id {
            if let Err(e) = self.catalog.increment_coupon_usage(coupon_id).await {
                // The booking stands; usage accounting is best-effort here.
                warn!(coupon_id = %coupon_id, "failed to record coupon redemption: {e}");
            }
        }
        session.reservation = None;
        session.booking = Some(booking);
        Ok(())
    }

    async fn record_confirmed(
        &self,
        session: &mut CheckoutSession,
        booking: Booking,
    ) -> Result<(), ServiceError> {
        self.hand_off_booking(session, booking.clone()).await?;
        session.state = CheckoutState::Confirmed;
        info!(booking_id = %booking.booking_id, reference = %booking.reference, "booking confirmed");
        self.events.send(Event::BookingConfirmed(booking.booking_id)).await;
        Ok(())
    }

    async fn fail_session(&self, session_id: Uuid, reason: &str) {
        let reservation = self.sessions.get_mut(&session_id).and_then(|mut s| {
            s.state = CheckoutState::Failed;
            s.reservation.take()
        });
        if let Some(r) = reservation {
            self.release(&r).await;
        }
        self.events
            .send(Event::BookingFailed {
                session_id,
                reason: reason.to_string(),
            })
            .await;
    }

    async fn release(&self, reservation: &Reservation) {
        self.capacity.release(reservation);
        self.events
            .send(Event::ReservationReleased {
                provider_id: reservation.key.provider_id,
                date: reservation.key.date,
                batch_id: reservation.key.batch_id.clone(),
                quantity: reservation.quantity,
            })
            .await;
    }
}
