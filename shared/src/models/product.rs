//! Product catalog models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

use crate::money::Money;

/// Product listing status (not a workflow; no transition table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    Active,
    Inactive,
}

/// Product category, optionally nested via `parent_id`
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub parent_id: Option<String>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub category_id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub base_price: Money,
    pub cost: Option<Money>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub view_count: i64,
    pub rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchasable variant with its own price and stock
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductSku {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub price: Money,
    pub stock: i64,
    pub reserved_stock: i64,
    pub attributes: Option<Json<HashMap<String, String>>>,
    pub barcode: Option<String>,
    pub weight: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product image
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: String,
    pub product_id: String,
    pub url: String,
    pub alt_text: Option<String>,
    pub display_order: i64,
    pub is_thumbnail: bool,
    pub created_at: DateTime<Utc>,
}

/// Stock movement audit row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLog {
    pub id: String,
    pub sku_id: String,
    pub movement_type: String,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Product with category, variants and images
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithDetails {
    #[serde(flatten)]
    pub product: Product,
    pub category: Option<Category>,
    pub skus: Vec<ProductSku>,
    pub images: Vec<ProductImage>,
}

/// Product creation payload (created as `draft`)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreate {
    #[validate(length(min = 1))]
    pub category_id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    pub base_price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<String>,
}

/// Partial product update
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub base_price: Option<Money>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

/// Listing filters; newest first, paginated
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// SKU creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SkuCreate {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub sku: String,
    pub price: Money,
    #[validate(range(min = 0))]
    pub stock: i64,
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Stock adjustment payload; quantity may be negative
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    #[validate(length(min = 1))]
    pub sku_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub movement_type: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
}

/// Category creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCreate {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub display_order: Option<i64>,
}
