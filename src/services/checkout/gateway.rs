//! Hosted payment-gateway integration: order creation before the redirect
//! and signature verification on the callback.
//!
//! The gateway signs callbacks with HMAC-SHA256 over
//! `"<order_handle>|<payment_reference>"` using the provider's key secret.
//! Verification runs entirely in-process; no network call.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::catalog::GatewayCredentials;
use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Order registered with the gateway ahead of the hosted widget.
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub order_handle: String,
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Checks the gateway is reachable before any money-moving call. The
    /// source system's equivalent was loading the widget script.
    async fn ensure_available(&self) -> Result<(), ServiceError>;

    async fn create_order(
        &self,
        credentials: &GatewayCredentials,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError>;
}

fn mac_over(
    key_secret: &str,
    order_handle: &str,
    payment_reference: &str,
) -> Result<HmacSha256, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("hmac key setup failed: {e}")))?;
    mac.update(order_handle.as_bytes());
    mac.update(b"|");
    mac.update(payment_reference.as_bytes());
    Ok(mac)
}

/// Verifies a callback signature. The expected MAC is computed over
/// `order_handle|payment_reference` and compared in constant time.
pub fn verify_signature(
    key_secret: &str,
    order_handle: &str,
    payment_reference: &str,
    signature_hex: &str,
) -> Result<(), ServiceError> {
    let mac = mac_over(key_secret, order_handle, payment_reference)?;
    let signature = hex::decode(signature_hex.trim())
        .map_err(|_| ServiceError::VerificationFailed("signature is not valid hex".to_string()))?;
    mac.verify_slice(&signature)
        .map_err(|_| ServiceError::VerificationFailed("signature mismatch".to_string()))
}

/// Signs as the gateway would. Lives next to the verifier so the two can
/// never drift; production traffic only ever verifies.
pub fn sign(
    key_secret: &str,
    order_handle: &str,
    payment_reference: &str,
) -> Result<String, ServiceError> {
    let mac = mac_over(key_secret, order_handle, payment_reference)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| {
            let chars = b"abcdefghijklmnopqrstuvwxyz0123456789";
            chars[rng.gen_range(0..chars.len())] as char
        })
        .collect()
}

pub fn new_receipt() -> String {
    format!("rcpt_{}", random_suffix())
}

/// In-process gateway used by the binary's default wiring and the test
/// harness. Always available; fabricates order handles locally.
#[derive(Debug, Clone, Default)]
pub struct InProcessGateway;

#[async_trait]
impl GatewayClient for InProcessGateway {
    async fn ensure_available(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn create_order(
        &self,
        _credentials: &GatewayCredentials,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        if amount_minor < 0 {
            return Err(ServiceError::OrderCreationFailed(format!(
                "negative amount: {amount_minor}"
            )));
        }
        Ok(GatewayOrder {
            order_handle: format!("order_{}", random_suffix()),
            amount_minor,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let sig = sign("secret", "order_abc", "pay_123").unwrap();
        assert!(verify_signature("secret", "order_abc", "pay_123", &sig).is_ok());
    }

    #[test]
    fn tampered_reference_fails_verification() {
        let sig = sign("secret", "order_abc", "pay_123").unwrap();
        let err = verify_signature("secret", "order_abc", "pay_999", &sig).unwrap_err();
        assert!(matches!(err, ServiceError::VerificationFailed(_)));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let sig = sign("secret", "order_abc", "pay_123").unwrap();
        assert!(verify_signature("other", "order_abc", "pay_123", &sig).is_err());
    }

    #[test]
    fn garbage_signature_fails_cleanly() {
        assert!(verify_signature("secret", "order_abc", "pay_123", "zz-not-hex").is_err());
    }

    #[tokio::test]
    async fn in_process_gateway_creates_orders() {
        let creds = GatewayCredentials {
            key_id: "key".into(),
            key_secret: "secret".into(),
        };
        let order = InProcessGateway
            .create_order(&creds, 50_000, "INR", "rcpt_x")
            .await
            .unwrap();
        assert!(order.order_handle.starts_with("order_"));
        assert_eq!(order.amount_minor, 50_000);
    }
}
