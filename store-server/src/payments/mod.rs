//! Payment provider integration
//!
//! The payment service talks to the external provider through the
//! [`PaymentProvider`] trait: Stripe over HTTP in deployment, an
//! in-memory mock in tests and local development. Idempotency, retry
//! and reconciliation live inside the provider, not here.

pub mod mock;
pub mod stripe;
pub mod webhook;

use std::collections::HashMap;

use async_trait::async_trait;

use shared::AppResult;

pub use mock::MockProvider;
pub use stripe::StripeProvider;

/// Payment intent as reported by the provider
#[derive(Debug, Clone)]
pub struct ProviderIntent {
    pub id: String,
    pub client_secret: Option<String>,
    /// Provider-side status string (`succeeded`, `processing`, ...)
    pub status: String,
    pub charge_id: Option<String>,
}

/// Refund as reported by the provider
#[derive(Debug, Clone)]
pub struct ProviderRefund {
    pub id: String,
    pub status: String,
}

/// External payment provider seam
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment intent; amounts are integer cents
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderIntent>;

    /// Re-fetch an intent's current status
    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<ProviderIntent>;

    /// Refund (part of) a charge
    async fn create_refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        reason: Option<&str>,
    ) -> AppResult<ProviderRefund>;
}
