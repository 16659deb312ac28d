//! RPC response envelope
//!
//! Every procedure answers HTTP 200 with one of:
//!
//! ```json
//! { "success": true, "data": { ... } }
//! { "success": false, "error": "Order not found" }
//! ```
//!
//! Service errors never surface as transport-level failures; only
//! malformed requests (extractor rejections) and panics fall through to
//! the framework defaults.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// `{success, data|error}` envelope returned by every RPC procedure
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> RpcResponse<T> {
    /// Successful response
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response carrying the error message
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Flatten a service result into the envelope
    pub fn from_result(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.public_message()),
        }
    }
}
