//! What each payment channel hands back to the customer at submission.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::DirectTransferHandle;
use crate::models::Booking;

/// Channel-specific continuation returned by a successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelInitiation {
    /// Pay-on-arrival: the booking is already confirmed, nothing to pay now.
    Immediate { booking: Booking },
    /// Direct transfer: a pending booking exists; the customer pays
    /// out-of-band and then self-asserts.
    PaymentRequest {
        booking: Booking,
        request: DirectTransferRequest,
    },
    /// Gateway redirect: open the hosted widget with these parameters.
    Redirect {
        order_handle: String,
        key_id: String,
        amount_minor: i64,
        currency: String,
    },
}

/// Everything a client needs to render the scan-to-pay step.
#[derive(Debug, Clone, Serialize)]
pub struct DirectTransferRequest {
    pub vpa: String,
    pub payee_name: String,
    pub amount: Decimal,
    pub currency: String,
    /// Transaction note carried into the payer's UPI app; ties the transfer
    /// back to the customer and booking during manual reconciliation.
    pub note: String,
    pub link: String,
}

impl DirectTransferRequest {
    pub fn build(
        handle: &DirectTransferHandle,
        amount: Decimal,
        currency: &str,
        customer_id: Uuid,
        booking_id: Uuid,
    ) -> Self {
        let note = format!("CID:{customer_id} AID:{booking_id}");
        let link = format!(
            "upi://pay?pa={}&pn={}&am={}&cu={}&tn={}",
            encode_component(&handle.vpa),
            encode_component(&handle.payee_name),
            amount,
            currency,
            encode_component(&note),
        );
        Self {
            vpa: handle.vpa.clone(),
            payee_name: handle.payee_name.clone(),
            amount,
            currency: currency.to_string(),
            note,
            link,
        }
    }
}

/// Percent-encodes a query component. UPI apps are strict about unescaped
/// spaces and ampersands in the note field.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'@' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn upi_link_carries_reconciliation_note() {
        let handle = DirectTransferHandle {
            vpa: "clinic@upi".into(),
            payee_name: "City Clinic".into(),
        };
        let customer = Uuid::new_v4();
        let booking = Uuid::new_v4();
        let req = DirectTransferRequest::build(&handle, dec!(450), "INR", customer, booking);

        assert_eq!(req.note, format!("CID:{customer} AID:{booking}"));
        assert!(req.link.starts_with("upi://pay?pa=clinic@upi&pn=City%20Clinic&am=450&cu=INR&tn="));
        assert!(req.link.contains("%20AID%3A"));
        assert!(!req.link.contains(' '));
    }

    #[test]
    fn encode_component_leaves_unreserved_untouched() {
        assert_eq!(encode_component("abc-XYZ_0.9~@"), "abc-XYZ_0.9~@");
        assert_eq!(encode_component("a b&c"), "a%20b%26c");
    }
}
