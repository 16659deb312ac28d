//! Shipping service
//!
//! Shipments are priced from the chosen method's base price, a regional
//! zone multiplier looked up by the destination country and state, and
//! a per-weight surcharge. No zone match means multiplier 1.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::types::Json;
use uuid::Uuid;

use shared::models::{
    Shipment, ShipmentCreate, ShipmentHistory, ShipmentStatusUpdate, ShippingMethod,
    ShippingQuote, ShippingZone, calculate_shipping_cost,
};
use shared::{AppError, AppResult, ShipmentStatus};

use crate::db::DbService;

#[derive(Clone)]
pub struct ShippingService {
    db: DbService,
}

impl ShippingService {
    pub fn new(db: DbService) -> Self {
        Self { db }
    }

    /// Create a shipment for an order, pricing it up front
    pub async fn create_shipment(&self, input: ShipmentCreate) -> AppResult<Shipment> {
        let method = self.get_method(&input.shipping_method_id).await?;
        let quote = self
            .quote(
                &method,
                &input.shipping_address.country,
                input.shipping_address.state.as_deref(),
                input.weight,
            )
            .await?;

        let shipment_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "INSERT INTO shipments (id, order_id, user_id, status, carrier, shipping_address, \
             weight, shipping_cost, notes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&shipment_id)
        .bind(&input.order_id)
        .bind(&input.user_id)
        .bind(ShipmentStatus::Pending)
        .bind(&method.carrier)
        .bind(Json(&input.shipping_address))
        .bind(input.weight)
        .bind(quote.cost)
        .bind(&input.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        Self::append_history(&mut tx, &shipment_id, "pending", None, Some("Shipment created"))
            .await?;
        tx.commit().await?;

        tracing::info!(shipment_id = %shipment_id, order_id = %input.order_id, "Shipment created");
        self.get_shipment(&shipment_id).await
    }

    pub async fn get_shipment(&self, shipment_id: &str) -> AppResult<Shipment> {
        sqlx::query_as::<_, Shipment>("SELECT * FROM shipments WHERE id = ?")
            .bind(shipment_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Shipment"))
    }

    /// Shipments for one order, newest first
    pub async fn get_order_shipments(&self, order_id: &str) -> AppResult<Vec<Shipment>> {
        let shipments = sqlx::query_as::<_, Shipment>(
            "SELECT * FROM shipments WHERE order_id = ? ORDER BY created_at DESC",
        )
        .bind(order_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(shipments)
    }

    /// Shipments belonging to one user, newest first
    pub async fn get_user_shipments(&self, user_id: &str) -> AppResult<Vec<Shipment>> {
        let shipments = sqlx::query_as::<_, Shipment>(
            "SELECT * FROM shipments WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(shipments)
    }

    /// Transition the shipment; delivery stamps `actual_delivery`
    pub async fn update_status(&self, input: ShipmentStatusUpdate) -> AppResult<Shipment> {
        let shipment = self.get_shipment(&input.shipment_id).await?;
        let next = shipment.status.transition(input.status)?;
        let now = Utc::now();
        let delivered_at = (next == ShipmentStatus::Delivered).then_some(now);

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(
            "UPDATE shipments SET status = ?, \
             tracking_number = COALESCE(?, tracking_number), \
             actual_delivery = COALESCE(?, actual_delivery), updated_at = ? WHERE id = ?",
        )
        .bind(next)
        .bind(&input.tracking_number)
        .bind(delivered_at)
        .bind(now)
        .bind(&input.shipment_id)
        .execute(&mut *tx)
        .await?;
        Self::append_history(
            &mut tx,
            &input.shipment_id,
            next.as_str(),
            input.location.as_deref(),
            input.message.as_deref(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(shipment_id = %input.shipment_id, from = %shipment.status, to = %next, "Shipment status updated");
        self.get_shipment(&input.shipment_id).await
    }

    /// Quote a cost without creating a shipment
    pub async fn calculate_cost(
        &self,
        shipping_method_id: &str,
        country: &str,
        state: Option<&str>,
        weight: f64,
    ) -> AppResult<ShippingQuote> {
        let method = self.get_method(shipping_method_id).await?;
        self.quote(&method, country, state, weight).await
    }

    /// Active shipping methods
    pub async fn get_methods(&self) -> AppResult<Vec<ShippingMethod>> {
        let methods = sqlx::query_as::<_, ShippingMethod>(
            "SELECT * FROM shipping_methods WHERE is_active = 1 ORDER BY base_price",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(methods)
    }

    pub async fn get_history(&self, shipment_id: &str) -> AppResult<Vec<ShipmentHistory>> {
        let history = sqlx::query_as::<_, ShipmentHistory>(
            "SELECT * FROM shipment_history WHERE shipment_id = ? ORDER BY created_at, id",
        )
        .bind(shipment_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(history)
    }

    async fn get_method(&self, method_id: &str) -> AppResult<ShippingMethod> {
        sqlx::query_as::<_, ShippingMethod>(
            "SELECT * FROM shipping_methods WHERE id = ? AND is_active = 1",
        )
        .bind(method_id)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Shipping method"))
    }

    async fn quote(
        &self,
        method: &ShippingMethod,
        country: &str,
        state: Option<&str>,
        weight: f64,
    ) -> AppResult<ShippingQuote> {
        if weight < 0.0 {
            return Err(AppError::validation("Weight must not be negative"));
        }

        let zone = sqlx::query_as::<_, ShippingZone>(
            "SELECT * FROM shipping_zones WHERE country = ? AND state = ?",
        )
        .bind(country)
        .bind(state.unwrap_or(""))
        .fetch_optional(&self.db.pool)
        .await?;

        let multiplier = zone
            .map(|z| Decimal::try_from(z.multiplier))
            .transpose()
            .map_err(|e| AppError::database(format!("Bad zone multiplier: {e}")))?
            .unwrap_or(Decimal::ONE);
        let weight = Decimal::try_from(weight)
            .map_err(|_| AppError::validation("Weight is not a valid number"))?;

        Ok(ShippingQuote {
            cost: calculate_shipping_cost(method.base_price, multiplier, weight),
            carrier: method.carrier.clone(),
            estimated_days: method.estimated_days,
        })
    }

    async fn append_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        shipment_id: &str,
        status: &str,
        location: Option<&str>,
        message: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO shipment_history (id, shipment_id, status, location, message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(shipment_id)
        .bind(status)
        .bind(location)
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
    use shared::Money;
    use shared::models::Address;
    use std::str::FromStr;

    async fn service() -> ShippingService {
        let svc = ShippingService::new(DbService::in_memory(ServiceKind::Shipping).await.unwrap());
        sqlx::query(
            "INSERT INTO shipping_methods (id, name, carrier, base_price, estimated_days, is_active) \
             VALUES ('method-1', 'Standard', 'UPS', '50', 5, 1)",
        )
        .execute(&svc.db.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO shipping_zones (id, country, state, multiplier) \
             VALUES ('zone-1', 'US', 'CA', 1.2)",
        )
        .execute(&svc.db.pool)
        .await
        .unwrap();
        svc
    }

    fn address(state: Option<&str>) -> Address {
        Address {
            recipient_name: None,
            phone: None,
            street: "1 Main St".into(),
            city: "Oakland".into(),
            state: state.map(Into::into),
            zip_code: "94601".into(),
            country: "US".into(),
        }
    }

    #[tokio::test]
    async fn cost_applies_zone_multiplier_and_weight() {
        let svc = service().await;
        let quote = svc
            .calculate_cost("method-1", "US", Some("CA"), 10.0)
            .await
            .unwrap();
        // 50 * 1.2 + 10 * 0.5
        assert_eq!(quote.cost, Money::from_str("65").unwrap());
        assert_eq!(quote.carrier, "UPS");
    }

    #[tokio::test]
    async fn unmatched_zone_uses_multiplier_one() {
        let svc = service().await;
        let quote = svc
            .calculate_cost("method-1", "FR", None, 0.0)
            .await
            .unwrap();
        assert_eq!(quote.cost, Money::from_str("50").unwrap());
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let svc = service().await;
        let err = svc
            .calculate_cost("missing", "US", None, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delivery_stamps_actual_delivery() {
        let svc = service().await;
        let shipment = svc
            .create_shipment(ShipmentCreate {
                order_id: "order-1".into(),
                user_id: "user-1".into(),
                shipping_address: address(Some("CA")),
                weight: 2.0,
                shipping_method_id: "method-1".into(),
                notes: None,
            })
            .await
            .unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Pending);

        for status in [
            ShipmentStatus::Processing,
            ShipmentStatus::Shipped,
            ShipmentStatus::InTransit,
            ShipmentStatus::Delivered,
        ] {
            svc.update_status(ShipmentStatusUpdate {
                shipment_id: shipment.id.clone(),
                status,
                tracking_number: Some("1Z999".into()),
                location: None,
                message: None,
            })
            .await
            .unwrap();
        }

        let delivered = svc.get_shipment(&shipment.id).await.unwrap();
        assert_eq!(delivered.status, ShipmentStatus::Delivered);
        assert!(delivered.actual_delivery.is_some());
        assert_eq!(delivered.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(svc.get_history(&shipment.id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn delivered_shipment_cannot_fail() {
        let svc = service().await;
        let shipment = svc
            .create_shipment(ShipmentCreate {
                order_id: "order-1".into(),
                user_id: "user-1".into(),
                shipping_address: address(None),
                weight: 1.0,
                shipping_method_id: "method-1".into(),
                notes: None,
            })
            .await
            .unwrap();

        // pending -> failed is allowed (non-terminal)
        let failed = svc
            .update_status(ShipmentStatusUpdate {
                shipment_id: shipment.id.clone(),
                status: ShipmentStatus::Failed,
                tracking_number: None,
                location: None,
                message: Some("address unreachable".into()),
            })
            .await
            .unwrap();
        assert_eq!(failed.status, ShipmentStatus::Failed);

        // failed is terminal
        let err = svc
            .update_status(ShipmentStatusUpdate {
                shipment_id: shipment.id,
                status: ShipmentStatus::Processing,
                tracking_number: None,
                location: None,
                message: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }
}
