//! Payment service RPC surface and webhook endpoint
//!
//! The webhook route sits outside `/rpc/` because it speaks the
//! provider's protocol: raw body, `Stripe-Signature` header, and plain
//! HTTP status codes instead of the envelope.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use shared::{AppError, AppResult};

use crate::core::ServiceState;
use crate::payments::webhook;
use crate::services::PaymentService;

use super::{RpcResult, decode, parse, respond, unknown_procedure};

#[derive(Clone)]
struct PaymentApiState {
    service: PaymentService,
    webhook_secret: String,
}

pub fn router(state: ServiceState) -> AppResult<Router> {
    let provider = state.provider.clone().ok_or_else(|| {
        AppError::Internal("Payment service configured without a payment provider".to_string())
    })?;
    let api_state = PaymentApiState {
        service: PaymentService::new(state.db.clone(), provider),
        webhook_secret: state.config.stripe_webhook_secret.clone(),
    };
    Ok(Router::new()
        .route("/api/payments/rpc/{procedure}", post(dispatch))
        .route("/api/payments/webhook", post(handle_webhook))
        .with_state(api_state))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentIdArg {
    payment_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderIdArg {
    order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundIdArg {
    refund_id: String,
}

async fn dispatch(
    State(state): State<PaymentApiState>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    let service = &state.service;
    match procedure.as_str() {
        "createPaymentIntent" => {
            respond(async { service.create_payment_intent(parse(payload)?).await }.await)
        }
        "confirmPayment" => respond(async { service.confirm_payment(parse(payload)?).await }.await),
        "getPayment" => respond(
            async {
                let args: PaymentIdArg = decode(payload)?;
                service.get_payment(&args.payment_id).await
            }
            .await,
        ),
        "getOrderPayments" => respond(
            async {
                let args: OrderIdArg = decode(payload)?;
                service.get_order_payments(&args.order_id).await
            }
            .await,
        ),
        "createRefund" => respond(async { service.create_refund(parse(payload)?).await }.await),
        "getRefund" => respond(
            async {
                let args: RefundIdArg = decode(payload)?;
                service.get_refund(&args.refund_id).await
            }
            .await,
        ),
        "getHistory" => respond(
            async {
                let args: PaymentIdArg = decode(payload)?;
                service.get_history(&args.payment_id).await
            }
            .await,
        ),
        other => unknown_procedure(other),
    }
}

/// Provider webhook: verify the signature over the raw body, then apply
/// the event. Always acknowledges verified deliveries with 200.
async fn handle_webhook(
    State(state): State<PaymentApiState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::invalid("Missing Stripe-Signature header"))?;

    webhook::verify_signature(&state.webhook_secret, signature, body.as_bytes())?;

    let event: webhook::WebhookEvent = serde_json::from_str(&body)
        .map_err(|e| AppError::invalid(format!("Malformed webhook payload: {e}")))?;

    tracing::info!(event_type = %event.event_type, "Webhook received");
    state.service.handle_webhook(event).await?;

    Ok(Json(json!({ "received": true })))
}
