//! Return (RMA) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use validator::Validate;

use crate::models::Address;
use crate::money::Money;
use crate::status::{RefundStatus, ReturnStatus};

/// Return request entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub status: ReturnStatus,
    pub reason: String,
    pub description: Option<String>,
    pub refund_amount: Money,
    pub refund_status: RefundStatus,
    pub tracking_number: Option<String>,
    pub return_address: Option<Json<Address>>,
    pub images: Option<Json<Vec<String>>>,
    pub notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only return audit row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReturnHistory {
    pub id: String,
    pub return_id: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Selectable return reason
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReturnReason {
    pub id: String,
    pub label: String,
    pub is_active: bool,
}

/// Return policy; the single active row drives refund calculation
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPolicy {
    pub id: String,
    pub name: String,
    pub refund_percentage: f64,
    pub restocking_fee: Money,
    pub window_days: i64,
    pub is_active: bool,
}

/// Return request creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequestCreate {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub reason: String,
    #[serde(default)]
    pub description: Option<String>,
    pub refund_amount: Money,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Return approval payload; attaches the warehouse return address
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReturnApprove {
    #[validate(length(min = 1))]
    pub return_id: String,
    #[validate(nested)]
    pub return_address: Address,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Return status update payload (shipped / received / refunded)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReturnStatusUpdate {
    #[validate(length(min = 1))]
    pub return_id: String,
    pub status: ReturnStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Refund calculation result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundQuote {
    pub original_amount: Money,
    pub refund_amount: Money,
    pub refund_percentage: f64,
    pub restocking_fee: Money,
}

/// Pure refund calculator: `amount × refund% − restocking fee`, floored at 0
pub fn calculate_refund_amount(original: Money, policy: &ReturnPolicy) -> Money {
    let percentage = Decimal::try_from(policy.refund_percentage).unwrap_or(Decimal::ZERO);
    let gross = original * (percentage / Decimal::from(100));
    (gross - policy.restocking_fee).floor_at_zero().rounded()
}
