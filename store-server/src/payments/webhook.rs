//! Webhook signature verification and event parsing
//!
//! Stripe signs each delivery with the header
//! `Stripe-Signature: t=<unix>,v1=<hex hmac>` where the HMAC-SHA256 is
//! computed over `"{t}.{raw body}"` with the endpoint's signing secret.

use serde::Deserialize;

use shared::{AppError, AppResult};

/// Event types the payment service reacts to
pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";
pub const EVENT_CHARGE_REFUNDED: &str = "charge.refunded";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

/// The provider object carried in the event; `id` is the payment
/// intent id for `payment_intent.*` events and the charge id for
/// `charge.*` events
#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub latest_charge: Option<String>,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

#[derive(Debug, Deserialize)]
pub struct LastPaymentError {
    pub message: Option<String>,
}

/// Verify the `Stripe-Signature` header against the raw request body
pub fn verify_signature(secret: &str, header: &str, payload: &[u8]) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::invalid("Malformed webhook signature header"))?;
    if signatures.is_empty() {
        return Err(AppError::invalid("Malformed webhook signature header"));
    }

    let mut signed = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);

    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes());
    for signature in signatures {
        if let Ok(sig_bytes) = hex::decode(signature) {
            if ring::hmac::verify(&key, &signed, &sig_bytes).is_ok() {
                return Ok(());
            }
        }
    }

    Err(AppError::invalid("Webhook signature mismatch"))
}

#[cfg(test)]
pub fn sign_payload(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);
    let tag = ring::hmac::sign(&key, &signed);
    format!("t={timestamp},v1={}", hex::encode(tag.as_ref()))
}
