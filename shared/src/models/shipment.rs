//! Shipment models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

use crate::models::Address;
use crate::money::Money;
use crate::status::ShipmentStatus;

/// Shipment entity; the carrier field is descriptive only
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub status: ShipmentStatus,
    pub carrier: String,
    pub tracking_number: Option<String>,
    pub shipping_address: Json<Address>,
    pub weight: f64,
    pub shipping_cost: Money,
    pub notes: Option<String>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only shipment audit row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentHistory {
    pub id: String,
    pub shipment_id: String,
    pub status: String,
    pub location: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Shipping method with its base price
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethod {
    pub id: String,
    pub name: String,
    pub carrier: String,
    pub base_price: Money,
    pub estimated_days: i64,
    pub is_active: bool,
}

/// Regional price multiplier, matched on country + state
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShippingZone {
    pub id: String,
    pub country: String,
    pub state: String,
    pub multiplier: f64,
}

/// Shipment creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentCreate {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(nested)]
    pub shipping_address: Address,
    #[validate(range(min = 0.0))]
    pub weight: f64,
    #[validate(length(min = 1))]
    pub shipping_method_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Shipment status update payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentStatusUpdate {
    #[validate(length(min = 1))]
    pub shipment_id: String,
    pub status: ShipmentStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Shipping cost quote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingQuote {
    pub cost: Money,
    pub carrier: String,
    pub estimated_days: i64,
}

/// Weight surcharge per unit of weight
pub const WEIGHT_RATE: &str = "0.5";

/// Pure cost calculator: `base × multiplier + weight × rate`, rounded 2dp
pub fn calculate_shipping_cost(base_price: Money, multiplier: Decimal, weight: Decimal) -> Money {
    let rate: Decimal = WEIGHT_RATE.parse().expect("valid weight rate");
    ((base_price * multiplier) + Money::new(weight * rate)).rounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn base_times_zone_plus_weight_surcharge() {
        let cost = calculate_shipping_cost(
            Money::from_str("50").unwrap(),
            Decimal::from_str("1.2").unwrap(),
            Decimal::from(10),
        );
        assert_eq!(cost, Money::from_str("65").unwrap());
    }

    #[test]
    fn no_zone_means_multiplier_one() {
        let cost = calculate_shipping_cost(
            Money::from_str("9.99").unwrap(),
            Decimal::ONE,
            Decimal::ZERO,
        );
        assert_eq!(cost, Money::from_str("9.99").unwrap());
    }
}
