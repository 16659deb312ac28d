//! Order models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

use crate::models::Address;
use crate::money::Money;
use crate::status::OrderStatus;

/// Order entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping_amount: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub notes: Option<String>,
    pub shipping_address: Json<Address>,
    pub billing_address: Json<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line item
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub sku_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price: Money,
    pub attributes: Option<Json<HashMap<String, String>>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only order audit row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistory {
    pub id: String,
    pub order_id: String,
    pub status: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Order with its items and history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<OrderHistory>,
}

/// Line item payload for order creation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemCreate {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub sku_id: String,
    #[validate(length(min = 1))]
    pub product_name: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
    pub price: Money,
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
}

/// Order creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreate {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1), nested)]
    pub items: Vec<OrderItemCreate>,
    #[validate(nested)]
    pub shipping_address: Address,
    #[validate(nested)]
    pub billing_address: Address,
    #[serde(default)]
    pub shipping_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
}
