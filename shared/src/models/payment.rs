//! Payment and refund models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::money::Money;
use crate::status::{PaymentStatus, RefundStatus};

/// Payment entity, keyed by the provider's intent id once created
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount: Money,
    pub currency: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub provider_intent_id: Option<String>,
    pub provider_charge_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Refund entity, created only against a completed payment
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub order_id: String,
    pub amount: Money,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub provider_refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only payment audit row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistory {
    pub id: String,
    pub payment_id: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payment-intent creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentCreate {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    pub amount: Money,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

/// Payment confirmation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirm {
    #[validate(length(min = 1))]
    pub payment_id: String,
    #[validate(length(min = 1))]
    pub provider_intent_id: String,
}

/// Refund creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundCreate {
    #[validate(length(min = 1))]
    pub payment_id: String,
    #[validate(length(min = 1))]
    pub order_id: String,
    pub amount: Money,
    #[serde(default)]
    pub reason: Option<String>,
}
