//! The durable booking record handed to the external Catalog/Ledger service.
//!
//! This core only constructs the record; once handed off it is immutable
//! here. No error path ever downgrades a confirmed booking.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::draft::LineItem;

/// Payment channel a booking was settled (or will settle) through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannelKind {
    /// Hosted checkout widget with an asynchronous verification callback.
    GatewayRedirect,
    /// Scan-to-pay transfer with customer self-asserted completion.
    DirectTransfer,
    /// No payment step; settled at the venue.
    PayOnArrival,
}

/// Settlement state carried on the booking record.
///
/// `PendingManualConfirmation` is deliberately distinct from `Paid`: the
/// direct-transfer channel has no automated callback, so the customer's
/// "I've paid" assertion leaves the booking flagged for manual
/// reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Paid,
    PendingManualConfirmation,
    Unpaid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: Uuid,
    /// Human-facing reference, e.g. `APT-4F2A91C3`.
    pub reference: String,
    pub provider_id: Uuid,
    pub customer_id: Uuid,
    pub date: NaiveDate,
    pub batch_id: String,
    pub line_items: Vec<LineItem>,
    pub total: Decimal,
    pub payment_channel: PaymentChannelKind,
    pub payment_state: PaymentState,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new_reference(booking_id: Uuid) -> String {
        let short = booking_id.simple().to_string()[..8].to_uppercase();
        format!("APT-{short}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_is_short_and_prefixed() {
        let id = Uuid::new_v4();
        let r = Booking::new_reference(id);
        assert!(r.starts_with("APT-"));
        assert_eq!(r.len(), 12);
        assert!(r[4..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
