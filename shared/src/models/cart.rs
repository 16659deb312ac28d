//! Cart and wishlist models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

use crate::money::Money;

/// Cart entity; one `active` cart per user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub total_items: i64,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cart line item
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub sku_id: String,
    pub quantity: i64,
    pub price: Money,
    pub attributes: Option<Json<HashMap<String, String>>>,
    pub created_at: DateTime<Utc>,
}

/// Cart with its items
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartItem>,
}

/// Wishlist entry, unique per user + product
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub created_at: DateTime<Utc>,
}

/// Cart item payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemCreate {
    #[validate(length(min = 1))]
    pub cart_id: String,
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub sku_id: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
    pub price: Money,
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
}
