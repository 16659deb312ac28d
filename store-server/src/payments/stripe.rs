//! Stripe provider
//!
//! Thin client over the Stripe REST API. Requests are form-encoded and
//! authenticated with the secret key; only the fields the payment
//! service reads are deserialized.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use shared::{AppError, AppResult};

use super::{PaymentProvider, ProviderIntent, ProviderRefund};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeProvider {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    client_secret: Option<String>,
    status: String,
    latest_charge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeProvider {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::upstream(format!("Failed to read provider response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("Provider returned {status}"));
            tracing::warn!(target: "payments", %status, %message, "Provider request failed");
            return Err(AppError::upstream(message));
        }

        serde_json::from_slice(&body)
            .map_err(|e| AppError::upstream(format!("Unexpected provider response: {e}")))
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderIntent> {
        let mut params: Vec<(String, String)> = vec![
            ("amount".into(), amount_cents.to_string()),
            ("currency".into(), currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (key, value) in metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
        }

        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("Provider unreachable: {e}")))?;

        let intent: StripeIntent = Self::parse_response(response).await?;
        Ok(ProviderIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            charge_id: intent.latest_charge,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<ProviderIntent> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{intent_id}", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("Provider unreachable: {e}")))?;

        let intent: StripeIntent = Self::parse_response(response).await?;
        Ok(ProviderIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            charge_id: intent.latest_charge,
        })
    }

    async fn create_refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        reason: Option<&str>,
    ) -> AppResult<ProviderRefund> {
        let mut params: Vec<(String, String)> = vec![
            ("charge".into(), charge_id.to_string()),
            ("amount".into(), amount_cents.to_string()),
        ];
        if let Some(reason) = reason {
            params.push(("metadata[reason]".into(), reason.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("Provider unreachable: {e}")))?;

        let refund: StripeRefund = Self::parse_response(response).await?;
        Ok(ProviderRefund {
            id: refund.id,
            status: refund.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route(
                "/v1/payment_intents",
                post(|| async {
                    Json(json!({
                        "id": "pi_stub_1",
                        "client_secret": "pi_stub_1_secret",
                        "status": "requires_confirmation",
                        "latest_charge": null
                    }))
                }),
            )
            .route(
                "/v1/refunds",
                post(|| async {
                    (
                        axum::http::StatusCode::PAYMENT_REQUIRED,
                        Json(json!({
                            "error": { "message": "Charge ch_missing has already been refunded." }
                        })),
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn create_intent_parses_the_provider_response() {
        let provider = StripeProvider::new("sk_test_abc").with_base_url(spawn_stub().await);
        let intent = provider
            .create_intent(1999, "USD", &HashMap::new())
            .await
            .unwrap();
        assert_eq!(intent.id, "pi_stub_1");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_stub_1_secret"));
        assert_eq!(intent.status, "requires_confirmation");
        assert!(intent.charge_id.is_none());
    }

    #[tokio::test]
    async fn provider_errors_surface_their_message() {
        let provider = StripeProvider::new("sk_test_abc").with_base_url(spawn_stub().await);
        let err = provider
            .create_refund("ch_missing", 500, None)
            .await
            .unwrap_err();
        match err {
            AppError::Upstream(message) => {
                assert!(message.contains("already been refunded"), "{message}");
            }
            other => panic!("expected an upstream error, got {other:?}"),
        }
    }
}
