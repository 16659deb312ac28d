//! Postal address
//!
//! One explicit shape for shipping, billing and return addresses, stored
//! as a JSON column and validated once at the RPC boundary.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Postal address used across orders, shipments and returns
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Absent on return addresses (warehouse destinations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[validate(length(min = 1))]
    pub zip_code: String,
    #[validate(length(min = 1))]
    pub country: String,
}
