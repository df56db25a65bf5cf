//! Domain events emitted by the booking core.
//!
//! Events are fire-and-forget: services push onto a bounded mpsc channel and
//! a spawned processor logs them. The surrounding application can replace the
//! processor to fan events out to its own persistence or notification layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted {
        session_id: Uuid,
        provider_id: Uuid,
        channel: crate::models::PaymentChannelKind,
    },
    SlotReserved {
        provider_id: Uuid,
        date: NaiveDate,
        batch_id: String,
        quantity: u32,
    },
    ReservationReleased {
        provider_id: Uuid,
        date: NaiveDate,
        batch_id: String,
        quantity: u32,
    },
    CouponApplied {
        code: String,
        customer_id: Uuid,
        discount_amount: String,
    },
    BookingConfirmed(Uuid),
    BookingFailed {
        session_id: Uuid,
        reason: String,
    },
    CheckoutCancelled {
        session_id: Uuid,
        reason: String,
    },
    PaymentVerified {
        booking_id: Uuid,
        payment_reference: String,
    },
    PaymentPendingReconciliation {
        booking_id: Uuid,
        asserted_at: DateTime<Utc>,
    },
    CheckoutTimedOut {
        session_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging (not failing) when the processor has gone
    /// away. Event delivery is never on a request's critical path.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("event channel closed, dropping event: {e}");
        }
    }
}

/// Drains the event channel, logging each event. Runs until every sender is
/// dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::BookingConfirmed(id) => info!(booking_id = %id, "booking confirmed"),
            Event::BookingFailed { session_id, reason } => {
                warn!(session_id = %session_id, reason = %reason, "booking failed")
            }
            Event::CheckoutTimedOut { session_id } => {
                warn!(session_id = %session_id, "checkout timed out awaiting payment")
            }
            other => info!(event = ?other, "domain event"),
        }
    }
    info!("event channel closed, processor exiting");
}

/// Convenience for building a connected sender/processor pair.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (sender, mut rx) = channel(8);
        let id = Uuid::new_v4();
        sender.send(Event::BookingConfirmed(id)).await;
        match rx.recv().await {
            Some(Event::BookingConfirmed(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_does_not_panic() {
        let (sender, rx) = channel(1);
        drop(rx);
        sender.send(Event::CheckoutTimedOut { session_id: Uuid::new_v4() }).await;
    }
}
