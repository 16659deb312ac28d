//! Payment service
//!
//! Wraps the external provider: creates intents, confirms them by
//! re-fetching the provider status, and records refunds. Webhook events
//! apply the same state machine; replays of an already-applied status
//! are acknowledged without a second transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use shared::models::{
    Payment, PaymentConfirm, PaymentHistory, PaymentIntentCreate, Refund, RefundCreate,
};
use shared::{AppError, AppResult, PaymentStatus, RefundStatus};

use crate::db::DbService;
use crate::payments::webhook::{
    EVENT_CHARGE_REFUNDED, EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED, WebhookEvent,
};
use crate::payments::PaymentProvider;

#[derive(Clone)]
pub struct PaymentService {
    db: DbService,
    provider: Arc<dyn PaymentProvider>,
}

impl PaymentService {
    pub fn new(db: DbService, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { db, provider }
    }

    /// Create a payment row and a provider intent for it
    pub async fn create_payment_intent(&self, input: PaymentIntentCreate) -> AppResult<Payment> {
        if input.amount.is_negative() || input.amount == shared::Money::ZERO {
            return Err(AppError::validation("Payment amount must be positive"));
        }

        let currency = input.currency.unwrap_or_else(|| "USD".to_string());
        let mut metadata = input.metadata.unwrap_or_default();
        metadata.insert("orderId".to_string(), input.order_id.clone());
        metadata.insert("userId".to_string(), input.user_id.clone());

        let intent = self
            .provider
            .create_intent(input.amount.to_cents(), &currency, &metadata)
            .await?;

        let payment_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "INSERT INTO payments (id, order_id, user_id, amount, currency, payment_method, \
             status, provider_intent_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 'stripe', ?, ?, ?, ?)",
        )
        .bind(&payment_id)
        .bind(&input.order_id)
        .bind(&input.user_id)
        .bind(input.amount.rounded())
        .bind(&currency)
        .bind(PaymentStatus::Pending)
        .bind(&intent.id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, &payment_id, "pending", Some("Payment intent created"))
            .await?;
        tx.commit().await?;

        tracing::info!(payment_id = %payment_id, intent_id = %intent.id, "Payment intent created");
        self.get_payment(&payment_id).await
    }

    /// Confirm a payment by re-fetching the provider intent status
    pub async fn confirm_payment(&self, input: PaymentConfirm) -> AppResult<Payment> {
        let payment = self.get_payment(&input.payment_id).await?;
        if payment.provider_intent_id.as_deref() != Some(input.provider_intent_id.as_str()) {
            return Err(AppError::business("Payment intent mismatch"));
        }

        let intent = self.provider.retrieve_intent(&input.provider_intent_id).await?;
        let (next, message) = match intent.status.as_str() {
            "succeeded" => (PaymentStatus::Completed, "Payment succeeded".to_string()),
            "processing" => (PaymentStatus::Processing, "Payment processing".to_string()),
            other => (PaymentStatus::Failed, format!("Payment failed: {other}")),
        };

        self.apply_status(&payment, next, Some(message), intent.charge_id.as_deref(), None)
            .await
    }

    pub async fn get_payment(&self, payment_id: &str) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
            .bind(payment_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))
    }

    pub async fn get_refund(&self, refund_id: &str) -> AppResult<Refund> {
        sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = ?")
            .bind(refund_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Refund"))
    }

    /// Payments for one order, newest first
    pub async fn get_order_payments(&self, order_id: &str) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE order_id = ? ORDER BY created_at DESC",
        )
        .bind(order_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(payments)
    }

    /// Refund (part of) a completed payment
    pub async fn create_refund(&self, input: RefundCreate) -> AppResult<Refund> {
        let payment = self.get_payment(&input.payment_id).await?;

        if payment.status != PaymentStatus::Completed {
            return Err(AppError::business("Only completed payments can be refunded"));
        }
        if input.amount.is_negative() || input.amount == shared::Money::ZERO {
            return Err(AppError::validation("Refund amount must be positive"));
        }
        if input.amount > payment.amount {
            return Err(AppError::business(
                "Refund amount exceeds the payment amount",
            ));
        }
        let charge_id = payment
            .provider_charge_id
            .as_deref()
            .ok_or_else(|| AppError::business("Payment has no charge to refund"))?;

        let provider_refund = self
            .provider
            .create_refund(charge_id, input.amount.to_cents(), input.reason.as_deref())
            .await?;
        let status = match provider_refund.status.as_str() {
            "succeeded" => RefundStatus::Completed,
            "pending" => RefundStatus::Pending,
            _ => RefundStatus::Failed,
        };

        let refund_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "INSERT INTO refunds (id, payment_id, order_id, amount, reason, status, \
             provider_refund_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&refund_id)
        .bind(&input.payment_id)
        .bind(&input.order_id)
        .bind(input.amount.rounded())
        .bind(&input.reason)
        .bind(status)
        .bind(&provider_refund.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, &input.payment_id, "refund_created", input.reason.as_deref())
            .await?;
        tx.commit().await?;

        // a full refund moves the payment itself to refunded
        if status == RefundStatus::Completed && input.amount == payment.amount {
            self.apply_status(&payment, PaymentStatus::Refunded, None, None, None)
                .await?;
        }

        tracing::info!(refund_id = %refund_id, payment_id = %input.payment_id, "Refund created");
        sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = ?")
            .bind(refund_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(Into::into)
    }

    /// Apply a verified webhook event; replays are acknowledged quietly
    pub async fn handle_webhook(&self, event: WebhookEvent) -> AppResult<()> {
        match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => {
                let payment = self.get_by_intent(&event.data.object.id).await?;
                self.apply_status(
                    &payment,
                    PaymentStatus::Completed,
                    Some("Payment succeeded (webhook)".to_string()),
                    event.data.object.latest_charge.as_deref(),
                    None,
                )
                .await?;
            }
            EVENT_PAYMENT_FAILED => {
                let payment = self.get_by_intent(&event.data.object.id).await?;
                let message = event
                    .data
                    .object
                    .last_payment_error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "Payment failed".to_string());
                match self
                    .apply_status(
                        &payment,
                        PaymentStatus::Failed,
                        Some(message.clone()),
                        None,
                        Some(message),
                    )
                    .await
                {
                    // a late failure event for a settled payment is
                    // logged and acknowledged, not applied
                    Err(AppError::BusinessRule(rule)) => {
                        tracing::warn!(payment_id = %payment.id, %rule, "Ignoring stale webhook event");
                    }
                    other => {
                        other?;
                    }
                }
            }
            EVENT_CHARGE_REFUNDED => {
                let intent_id = event
                    .data
                    .object
                    .payment_intent
                    .ok_or_else(|| AppError::invalid("charge.refunded without payment_intent"))?;
                let payment = self.get_by_intent(&intent_id).await?;
                self.apply_status(
                    &payment,
                    PaymentStatus::Refunded,
                    Some("Charge refunded (webhook)".to_string()),
                    None,
                    None,
                )
                .await?;
            }
            other => {
                tracing::debug!(event_type = %other, "Ignoring unhandled webhook event");
            }
        }
        Ok(())
    }

    pub async fn get_history(&self, payment_id: &str) -> AppResult<Vec<PaymentHistory>> {
        let history = sqlx::query_as::<_, PaymentHistory>(
            "SELECT * FROM payment_history WHERE payment_id = ? ORDER BY created_at, id",
        )
        .bind(payment_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(history)
    }

    async fn get_by_intent(&self, intent_id: &str) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE provider_intent_id = ?")
            .bind(intent_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))
    }

    /// Transition the payment, recording history and provider ids.
    /// Re-applying the current status is a no-op acknowledgement.
    async fn apply_status(
        &self,
        payment: &Payment,
        next: PaymentStatus,
        message: Option<String>,
        charge_id: Option<&str>,
        error_message: Option<String>,
    ) -> AppResult<Payment> {
        if payment.status == next {
            tracing::debug!(payment_id = %payment.id, status = %next, "Status already applied");
            return self.get_payment(&payment.id).await;
        }
        let next = payment.status.transition(next)?;
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "UPDATE payments SET status = ?, \
             provider_charge_id = COALESCE(?, provider_charge_id), \
             error_message = COALESCE(?, error_message), updated_at = ? WHERE id = ?",
        )
        .bind(next)
        .bind(charge_id)
        .bind(&error_message)
        .bind(now)
        .bind(&payment.id)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, &payment.id, next.as_str(), message.as_deref()).await?;
        tx.commit().await?;

        tracing::info!(payment_id = %payment.id, from = %payment.status, to = %next, "Payment status updated");
        self.get_payment(&payment.id).await
    }

    async fn append_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        payment_id: &str,
        status: &str,
        message: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO payment_history (id, payment_id, status, message, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(payment_id)
        .bind(status)
        .bind(message)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServiceKind;
    use crate::payments::webhook::{WebhookData, WebhookObject};
    use crate::payments::MockProvider;
    use shared::Money;
    use std::str::FromStr;

    async fn service() -> (PaymentService, Arc<MockProvider>) {
        let provider = Arc::new(MockProvider::new());
        let db = DbService::in_memory(ServiceKind::Payment).await.unwrap();
        (PaymentService::new(db, provider.clone()), provider)
    }

    fn intent_input(amount: &str) -> PaymentIntentCreate {
        PaymentIntentCreate {
            order_id: "order-1".into(),
            user_id: "user-1".into(),
            amount: Money::from_str(amount).unwrap(),
            currency: None,
            metadata: None,
        }
    }

    fn succeeded_event(intent_id: &str, charge_id: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            event_type: EVENT_PAYMENT_SUCCEEDED.into(),
            data: WebhookData {
                object: WebhookObject {
                    id: intent_id.into(),
                    payment_intent: None,
                    latest_charge: charge_id.map(Into::into),
                    last_payment_error: None,
                },
            },
        }
    }

    #[tokio::test]
    async fn intent_creation_records_pending_payment() {
        let (svc, _) = service().await;
        let payment = svc.create_payment_intent(intent_input("49.99")).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.provider_intent_id.is_some());
        assert_eq!(svc.get_history(&payment.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn confirm_completes_a_succeeded_intent() {
        let (svc, provider) = service().await;
        let payment = svc.create_payment_intent(intent_input("25.00")).await.unwrap();
        let intent_id = payment.provider_intent_id.clone().unwrap();
        provider.succeed(&intent_id);

        let confirmed = svc
            .confirm_payment(PaymentConfirm {
                payment_id: payment.id.clone(),
                provider_intent_id: intent_id,
            })
            .await
            .unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Completed);
        assert!(confirmed.provider_charge_id.is_some());
    }

    #[tokio::test]
    async fn refund_requires_completed_payment() {
        let (svc, _) = service().await;
        let payment = svc.create_payment_intent(intent_input("25.00")).await.unwrap();

        let err = svc
            .create_refund(RefundCreate {
                payment_id: payment.id,
                order_id: "order-1".into(),
                amount: Money::from_str("10.00").unwrap(),
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn refund_cannot_exceed_payment_amount() {
        let (svc, provider) = service().await;
        let payment = svc.create_payment_intent(intent_input("25.00")).await.unwrap();
        let intent_id = payment.provider_intent_id.clone().unwrap();
        provider.succeed(&intent_id);
        svc.confirm_payment(PaymentConfirm {
            payment_id: payment.id.clone(),
            provider_intent_id: intent_id,
        })
        .await
        .unwrap();

        let err = svc
            .create_refund(RefundCreate {
                payment_id: payment.id.clone(),
                order_id: "order-1".into(),
                amount: Money::from_str("30.00").unwrap(),
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        // partial refund within the amount is fine
        let refund = svc
            .create_refund(RefundCreate {
                payment_id: payment.id,
                order_id: "order-1".into(),
                amount: Money::from_str("10.00").unwrap(),
                reason: Some("damaged item".into()),
            })
            .await
            .unwrap();
        assert_eq!(refund.status, RefundStatus::Completed);
    }

    #[tokio::test]
    async fn full_refund_marks_payment_refunded() {
        let (svc, provider) = service().await;
        let payment = svc.create_payment_intent(intent_input("25.00")).await.unwrap();
        let intent_id = payment.provider_intent_id.clone().unwrap();
        provider.succeed(&intent_id);
        svc.confirm_payment(PaymentConfirm {
            payment_id: payment.id.clone(),
            provider_intent_id: intent_id,
        })
        .await
        .unwrap();

        svc.create_refund(RefundCreate {
            payment_id: payment.id.clone(),
            order_id: "order-1".into(),
            amount: Money::from_str("25.00").unwrap(),
            reason: None,
        })
        .await
        .unwrap();

        let payment = svc.get_payment(&payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn webhook_replay_is_idempotent() {
        let (svc, _) = service().await;
        let payment = svc.create_payment_intent(intent_input("25.00")).await.unwrap();
        let intent_id = payment.provider_intent_id.clone().unwrap();

        svc.handle_webhook(succeeded_event(&intent_id, Some("ch_1")))
            .await
            .unwrap();
        svc.handle_webhook(succeeded_event(&intent_id, Some("ch_1")))
            .await
            .unwrap();

        let payment = svc.get_payment(&payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        // pending + one completed transition, no duplicate
        assert_eq!(svc.get_history(&payment.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stale_failure_after_success_is_acknowledged() {
        let (svc, _) = service().await;
        let payment = svc.create_payment_intent(intent_input("25.00")).await.unwrap();
        let intent_id = payment.provider_intent_id.clone().unwrap();
        svc.handle_webhook(succeeded_event(&intent_id, Some("ch_1")))
            .await
            .unwrap();

        let failed = WebhookEvent {
            event_type: EVENT_PAYMENT_FAILED.into(),
            data: WebhookData {
                object: WebhookObject {
                    id: intent_id.clone(),
                    payment_intent: None,
                    latest_charge: None,
                    last_payment_error: None,
                },
            },
        };
        svc.handle_webhook(failed).await.unwrap();

        let payment = svc.get_payment(&payment.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
    }
}
