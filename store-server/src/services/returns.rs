//! Return (RMA) service
//!
//! A return starts as `requested` and is approved or rejected by staff.
//! Approved returns move through shipped, received and refunded, each
//! step stamping its timestamp. Refund amounts come from the single
//! active return policy.

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use shared::models::{
    RefundQuote, ReturnApprove, ReturnHistory, ReturnPolicy, ReturnReason, ReturnRequest,
    ReturnRequestCreate, ReturnStatusUpdate, calculate_refund_amount,
};
use shared::{AppError, AppResult, Money, RefundStatus, ReturnStatus};

use crate::db::DbService;

#[derive(Clone)]
pub struct ReturnService {
    db: DbService,
}

impl ReturnService {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// File a return request
    pub async fn create_request(&self, input: ReturnRequestCreate) -> AppResult<ReturnRequest> {
        if input.refund_amount.is_negative() {
            return Err(AppError::validation("Refund amount must not be negative"));
        }

        let return_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "INSERT INTO returns (id, order_id, user_id, status, reason, description, \
             refund_amount, refund_status, images, notes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&return_id)
        .bind(&input.order_id)
        .bind(&input.user_id)
        .bind(ReturnStatus::Requested)
        .bind(&input.reason)
        .bind(&input.description)
        .bind(input.refund_amount.rounded())
        .bind(RefundStatus::Pending)
        .bind(input.images.as_ref().map(Json))
        .bind(&input.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, &return_id, "requested", Some("Return requested")).await?;
        tx.commit().await?;

        tracing::info!(return_id = %return_id, order_id = %input.order_id, "Return requested");
        self.get_request(&return_id).await
    }

    pub async fn get_request(&self, return_id: &str) -> AppResult<ReturnRequest> {
        sqlx::query_as::<_, ReturnRequest>("SELECT * FROM returns WHERE id = ?")
            .bind(return_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Return request"))
    }

    /// Returns filed against one order, newest first
    pub async fn get_order_returns(&self, order_id: &str) -> AppResult<Vec<ReturnRequest>> {
        let requests = sqlx::query_as::<_, ReturnRequest>(
            "SELECT * FROM returns WHERE order_id = ? ORDER BY created_at DESC",
        )
        .bind(order_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(requests)
    }

    /// Returns filed by one user, newest first
    pub async fn get_user_requests(&self, user_id: &str) -> AppResult<Vec<ReturnRequest>> {
        let requests = sqlx::query_as::<_, ReturnRequest>(
            "SELECT * FROM returns WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(requests)
    }

    /// Approve a requested return, attaching the warehouse address
    pub async fn approve(&self, input: ReturnApprove) -> AppResult<ReturnRequest> {
        let request = self.get_request(&input.return_id).await?;
        let next = request.status.transition(ReturnStatus::Approved)?;
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "UPDATE returns SET status = ?, return_address = ?, \
             notes = COALESCE(?, notes), approved_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(next)
        .bind(Json(&input.return_address))
        .bind(&input.notes)
        .bind(now)
        .bind(now)
        .bind(&input.return_id)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, &input.return_id, "approved", input.notes.as_deref())
            .await?;
        tx.commit().await?;

        tracing::info!(return_id = %input.return_id, "Return approved");
        self.get_request(&input.return_id).await
    }

    /// Reject a requested return with a reason
    pub async fn reject(&self, return_id: &str, reason: Option<String>) -> AppResult<ReturnRequest> {
        let request = self.get_request(return_id).await?;
        let next = request.status.transition(ReturnStatus::Rejected)?;
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query("UPDATE returns SET status = ?, notes = COALESCE(?, notes), updated_at = ? WHERE id = ?")
            .bind(next)
            .bind(&reason)
            .bind(now)
            .bind(return_id)
            .execute(&mut *tx)
            .await?;
        Self::append_history(&mut tx, return_id, "rejected", reason.as_deref()).await?;
        tx.commit().await?;

        tracing::info!(return_id = %return_id, "Return rejected");
        self.get_request(return_id).await
    }

    /// Progress an approved return; each step stamps its timestamp and
    /// reaching `refunded` marks the refund completed
    pub async fn update_status(&self, input: ReturnStatusUpdate) -> AppResult<ReturnRequest> {
        let request = self.get_request(&input.return_id).await?;
        let next = request.status.transition(input.status)?;
        let now = Utc::now();

        let (shipped_at, received_at, refunded_at) = match next {
            ReturnStatus::Shipped => (Some(now), None, None),
            ReturnStatus::Received => (None, Some(now), None),
            ReturnStatus::Refunded => (None, None, Some(now)),
            _ => (None, None, None),
        };
        let refund_status = (next == ReturnStatus::Refunded).then_some(RefundStatus::Completed);

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "UPDATE returns SET status = ?, \
             tracking_number = COALESCE(?, tracking_number), \
             refund_status = COALESCE(?, refund_status), \
             shipped_at = COALESCE(?, shipped_at), \
             received_at = COALESCE(?, received_at), \
             refunded_at = COALESCE(?, refunded_at), \
             notes = COALESCE(?, notes), updated_at = ? WHERE id = ?",
        )
        .bind(next)
        .bind(&input.tracking_number)
        .bind(refund_status)
        .bind(shipped_at)
        .bind(received_at)
        .bind(refunded_at)
        .bind(&input.notes)
        .bind(now)
        .bind(&input.return_id)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, &input.return_id, next.as_str(), input.notes.as_deref())
            .await?;
        tx.commit().await?;

        tracing::info!(return_id = %input.return_id, from = %request.status, to = %next, "Return status updated");
        self.get_request(&input.return_id).await
    }

    /// Quote the refund for an amount under the active policy
    pub async fn calculate_refund(&self, original_amount: Money) -> AppResult<RefundQuote> {
        if original_amount.is_negative() {
            return Err(AppError::validation("Amount must not be negative"));
        }
        let policy = self.active_policy().await?;
        Ok(RefundQuote {
            original_amount,
            refund_amount: calculate_refund_amount(original_amount, &policy),
            refund_percentage: policy.refund_percentage,
            restocking_fee: policy.restocking_fee,
        })
    }

    /// Active return reasons for the request form
    pub async fn get_reasons(&self) -> AppResult<Vec<ReturnReason>> {
        let reasons = sqlx::query_as::<_, ReturnReason>(
            "SELECT * FROM return_reasons WHERE is_active = 1 ORDER BY label",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(reasons)
    }

    /// Active return policies
    pub async fn get_policies(&self) -> AppResult<Vec<ReturnPolicy>> {
        let policies = sqlx::query_as::<_, ReturnPolicy>(
            "SELECT * FROM return_policies WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(policies)
    }

    pub async fn get_history(&self, return_id: &str) -> AppResult<Vec<ReturnHistory>> {
        let history = sqlx::query_as::<_, ReturnHistory>(
            "SELECT * FROM return_history WHERE return_id = ? ORDER BY created_at, id",
        )
        .bind(return_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(history)
    }

    async fn active_policy(&self) -> AppResult<ReturnPolicy> {
        sqlx::query_as::<_, ReturnPolicy>(
            "SELECT * FROM return_policies WHERE is_active = 1 LIMIT 1",
        )
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Return policy"))
    }

    async fn append_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        return_id: &str,
        status: &str,
        message: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO return_history (id, return_id, status, message, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(return_id)
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
    use shared::models::Address;
    use std::str::FromStr;

    async fn service() -> ReturnService {
        let svc = ReturnService::new(DbService::in_memory(ServiceKind::Return).await.unwrap());
        sqlx::query(
            "INSERT INTO return_policies (id, name, refund_percentage, restocking_fee, window_days, is_active) \
             VALUES ('pol-1', 'Standard', 90, '0', 30, 1)",
        )
        .execute(&svc.db.pool)
        .await
        .unwrap();
        svc
    }

    fn request_input() -> ReturnRequestCreate {
        ReturnRequestCreate {
            order_id: "order-1".into(),
            user_id: "user-1".into(),
            reason: "defective".into(),
            description: Some("screen cracked on arrival".into()),
            refund_amount: Money::from_str("49.99").unwrap(),
            images: None,
            notes: None,
        }
    }

    fn warehouse() -> Address {
        Address {
            recipient_name: Some("Returns Dept".into()),
            phone: None,
            street: "9 Warehouse Way".into(),
            city: "Reno".into(),
            state: Some("NV".into()),
            zip_code: "89501".into(),
            country: "US".into(),
        }
    }

    #[tokio::test]
    async fn approve_attaches_address_and_timestamp() {
        let svc = service().await;
        let request = svc.create_request(request_input()).await.unwrap();
        assert_eq!(request.status, ReturnStatus::Requested);

        let approved = svc
            .approve(ReturnApprove {
                return_id: request.id.clone(),
                return_address: warehouse(),
                notes: None,
            })
            .await
            .unwrap();
        assert_eq!(approved.status, ReturnStatus::Approved);
        assert!(approved.approved_at.is_some());
        assert!(approved.return_address.is_some());
    }

    #[tokio::test]
    async fn only_requested_returns_can_be_decided() {
        let svc = service().await;
        let request = svc.create_request(request_input()).await.unwrap();
        svc.reject(&request.id, Some("outside the return window".into()))
            .await
            .unwrap();

        let err = svc
            .approve(ReturnApprove {
                return_id: request.id,
                return_address: warehouse(),
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn refunded_step_completes_the_refund() {
        let svc = service().await;
        let request = svc.create_request(request_input()).await.unwrap();
        svc.approve(ReturnApprove {
            return_id: request.id.clone(),
            return_address: warehouse(),
            notes: None,
        })
        .await
        .unwrap();

        for status in [
            ReturnStatus::Shipped,
            ReturnStatus::Received,
            ReturnStatus::Refunded,
        ] {
            svc.update_status(ReturnStatusUpdate {
                return_id: request.id.clone(),
                status,
                tracking_number: None,
                notes: None,
            })
            .await
            .unwrap();
        }

        let done = svc.get_request(&request.id).await.unwrap();
        assert_eq!(done.status, ReturnStatus::Refunded);
        assert_eq!(done.refund_status, RefundStatus::Completed);
        assert!(done.shipped_at.is_some());
        assert!(done.received_at.is_some());
        assert!(done.refunded_at.is_some());
        assert_eq!(svc.get_history(&request.id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn refund_quote_follows_the_active_policy() {
        let svc = service().await;
        let quote = svc
            .calculate_refund(Money::from_str("100").unwrap())
            .await
            .unwrap();
        assert_eq!(quote.refund_amount, Money::from_str("90").unwrap());
        assert_eq!(quote.refund_percentage, 90.0);
    }

    #[tokio::test]
    async fn refund_quote_never_goes_negative() {
        let svc = service().await;
        sqlx::query("UPDATE return_policies SET restocking_fee = '10' WHERE id = 'pol-1'")
            .execute(&svc.db.pool)
            .await
            .unwrap();

        let quote = svc
            .calculate_refund(Money::from_str("5").unwrap())
            .await
            .unwrap();
        assert_eq!(quote.refund_amount, Money::ZERO);
    }
}
