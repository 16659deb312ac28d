//! Order service
//!
//! Orders are created with their line items and an initial history row
//! in one transaction. Status changes go through the order state
//! machine and always append exactly one history row.

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use shared::models::{Order, OrderCreate, OrderHistory, OrderItem, OrderWithDetails};
use shared::{AppError, AppResult, Money, OrderStatus};

use crate::db::DbService;

#[derive(Clone)]
pub struct OrderService {
    db: DbService,
}

impl OrderService {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// Create an order with its items; totals are computed server-side
    pub async fn create(&self, input: OrderCreate) -> AppResult<OrderWithDetails> {
        for item in &input.items {
            if item.price.is_negative() {
                return Err(AppError::validation("Item price must not be negative"));
            }
        }
        for amount in [
            &input.shipping_amount,
            &input.tax_amount,
            &input.discount_amount,
        ] {
            if amount.is_negative() {
                return Err(AppError::validation("Amounts must not be negative"));
            }
        }

        let items_total: Money = input
            .items
            .iter()
            .map(|item| item.price.times(item.quantity))
            .sum();
        let total_amount = (items_total + input.shipping_amount + input.tax_amount
            - input.discount_amount)
            .rounded();
        if total_amount.is_negative() {
            return Err(AppError::validation("Order total must not be negative"));
        }

        let order_id = Uuid::new_v4().to_string();
        let order_number = Self::generate_order_number();
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, user_id, order_number, status, total_amount, \
             shipping_amount, tax_amount, discount_amount, notes, shipping_address, \
             billing_address, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order_id)
        .bind(&input.user_id)
        .bind(&order_number)
        .bind(OrderStatus::Pending)
        .bind(total_amount)
        .bind(input.shipping_amount.rounded())
        .bind(input.tax_amount.rounded())
        .bind(input.discount_amount.rounded())
        .bind(&input.notes)
        .bind(Json(&input.shipping_address))
        .bind(Json(&input.billing_address))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &input.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, sku_id, product_name, \
                 quantity, price, attributes, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order_id)
            .bind(&item.product_id)
            .bind(&item.sku_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price.rounded())
            .bind(item.attributes.as_ref().map(Json))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO order_history (id, order_id, status, comment, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&order_id)
        .bind(OrderStatus::Pending.as_str())
        .bind("Order created")
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order_id, order_number = %order_number, "Order created");
        self.get_order(&order_id).await
    }

    /// Fetch one order with items and history
    pub async fn get_order(&self, order_id: &str) -> AppResult<OrderWithDetails> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))?;

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ? ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.db.pool)
        .await?;

        let history = self.get_history(order_id).await?;

        Ok(OrderWithDetails {
            order,
            items,
            history,
        })
    }

    /// List a user's orders, newest first, paginated
    pub async fn get_user_orders(
        &self,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<Order>> {
        let limit = limit.unwrap_or(10).clamp(1, 100);
        let offset = offset.unwrap_or(0).max(0);
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(orders)
    }

    /// Transition the order to a new status, appending one history row
    pub async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        comment: Option<String>,
    ) -> AppResult<Order> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))?;

        let next = order.status.transition(status)?;
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(next)
            .bind(now)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO order_history (id, order_id, status, comment, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(order_id)
        .bind(next.as_str())
        .bind(&comment)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, from = %order.status, to = %next, "Order status updated");
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(Into::into)
    }

    /// Cancel an order; only allowed before it has shipped
    pub async fn cancel(&self, order_id: &str, reason: Option<String>) -> AppResult<Order> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))?;

        if !order.status.is_cancellable() {
            return Err(AppError::business(format!(
                "Order in status {} cannot be cancelled",
                order.status
            )));
        }

        self.update_status(
            order_id,
            OrderStatus::Cancelled,
            reason.or_else(|| Some("Order cancelled".to_string())),
        )
        .await
    }

    /// Audit trail, oldest first
    pub async fn get_history(&self, order_id: &str) -> AppResult<Vec<OrderHistory>> {
        let history = sqlx::query_as::<_, OrderHistory>(
            "SELECT * FROM order_history WHERE order_id = ? ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(history)
    }

    fn generate_order_number() -> String {
        format!(
            "ORD-{}-{}",
            Utc::now().format("%Y%m%d"),
            Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServiceKind;
    use shared::models::{Address, OrderItemCreate};
    use std::str::FromStr;

    async fn service() -> OrderService {
        OrderService::new(DbService::in_memory(ServiceKind::Order).await.unwrap())
    }

    fn address() -> Address {
        Address {
            recipient_name: Some("Jane Doe".into()),
            phone: Some("555-0100".into()),
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: Some("IL".into()),
            zip_code: "62701".into(),
            country: "US".into(),
        }
    }

    fn order_input(items: Vec<OrderItemCreate>) -> OrderCreate {
        OrderCreate {
            user_id: "user-1".into(),
            items,
            shipping_address: address(),
            billing_address: address(),
            shipping_amount: Money::ZERO,
            tax_amount: Money::ZERO,
            discount_amount: Money::ZERO,
            notes: None,
        }
    }

    fn item(price: &str, quantity: i64) -> OrderItemCreate {
        OrderItemCreate {
            product_id: "prod-1".into(),
            sku_id: "sku-1".into(),
            product_name: "Widget".into(),
            quantity,
            price: Money::from_str(price).unwrap(),
            attributes: None,
        }
    }

    #[tokio::test]
    async fn create_computes_total_with_two_decimals() {
        let svc = service().await;
        let mut input = order_input(vec![item("19.99", 3)]);
        input.tax_amount = Money::from_str("4.937").unwrap();
        let order = svc.create(input).await.unwrap();
        // 59.97 + 4.94 tax, total rounded to cents
        assert_eq!(order.order.total_amount, Money::from_str("64.91").unwrap());
        assert_eq!(order.order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.history.len(), 1);
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let svc = service().await;
        let result = svc.create(order_input(vec![item("-1.00", 1)])).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn status_updates_follow_the_state_machine() {
        let svc = service().await;
        let order = svc.create(order_input(vec![item("10.00", 1)])).await.unwrap();
        let id = order.order.id;

        svc.update_status(&id, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        svc.update_status(&id, OrderStatus::Shipped, None)
            .await
            .unwrap();

        // pending -> delivered skips shipped, rejected
        let other = svc.create(order_input(vec![item("5.00", 1)])).await.unwrap();
        let err = svc
            .update_status(&other.order.id, OrderStatus::Delivered, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn cancel_appends_exactly_one_history_row() {
        let svc = service().await;
        let order = svc.create(order_input(vec![item("10.00", 2)])).await.unwrap();
        let id = order.order.id;

        let cancelled = svc.cancel(&id, Some("changed my mind".into())).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let history = svc.get_history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, "cancelled");
        assert_eq!(history[1].comment.as_deref(), Some("changed my mind"));
    }

    #[tokio::test]
    async fn shipped_order_cannot_be_cancelled() {
        let svc = service().await;
        let order = svc.create(order_input(vec![item("10.00", 1)])).await.unwrap();
        let id = order.order.id;
        svc.update_status(&id, OrderStatus::Confirmed, None)
            .await
            .unwrap();
        svc.update_status(&id, OrderStatus::Shipped, None)
            .await
            .unwrap();

        let err = svc.cancel(&id, None).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
        // no extra history row from the failed cancel
        assert_eq!(svc.get_history(&id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn user_orders_are_newest_first() {
        let svc = service().await;
        svc.create(order_input(vec![item("1.00", 1)])).await.unwrap();
        svc.create(order_input(vec![item("2.00", 1)])).await.unwrap();

        let orders = svc.get_user_orders("user-1", None, None).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(
            svc.get_user_orders("user-2", None, None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn user_orders_respect_limit_and_offset() {
        let svc = service().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let created = svc.create(order_input(vec![item("1.00", 1)])).await.unwrap();
            ids.push(created.order.id);
        }

        let page = svc.get_user_orders("user-1", Some(2), None).await.unwrap();
        assert_eq!(page.len(), 2);

        let rest = svc
            .get_user_orders("user-1", Some(2), Some(2))
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);

        // the two pages cover all three orders with no overlap
        let mut seen: Vec<_> = page.iter().chain(&rest).map(|o| o.id.clone()).collect();
        seen.sort();
        ids.sort();
        assert_eq!(seen, ids);
    }
}
