//! HTTP API
//!
//! Every procedure is exposed as `POST /api/{service}/rpc/{procedure}`
//! taking a JSON body and answering HTTP 200 with the
//! `{success, data|error}` envelope. Routers are built per hosted
//! service and merged by the server.

pub mod carts;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod returns;
pub mod shipping;
pub mod users;

use axum::{Json, Router};
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use shared::{AppError, AppResult, RpcResponse};

use crate::core::{ServiceKind, ServiceState};

/// Router for one hosted service
pub fn service_router(kind: ServiceKind, state: ServiceState) -> AppResult<Router> {
    Ok(match kind {
        ServiceKind::Product => products::router(state),
        ServiceKind::User => users::router(state),
        ServiceKind::Cart => carts::router(state),
        ServiceKind::Order => orders::router(state),
        ServiceKind::Payment => payments::router(state)?,
        ServiceKind::Shipping => shipping::router(state),
        ServiceKind::Return => returns::router(state),
    })
}

/// Envelope response type shared by all RPC handlers
pub(crate) type RpcResult = Json<RpcResponse<serde_json::Value>>;

/// Flatten a service result into the HTTP 200 envelope
pub(crate) fn respond<T: Serialize>(result: AppResult<T>) -> RpcResult {
    let result = result.and_then(|data| {
        serde_json::to_value(data)
            .map_err(|e| AppError::Internal(format!("Response serialization failed: {e}")))
    });
    Json(RpcResponse::from_result(result))
}

/// Deserialize a procedure input, running its validation rules
pub(crate) fn parse<T>(payload: serde_json::Value) -> AppResult<T>
where
    T: DeserializeOwned + Validate,
{
    let input: T = decode(payload)?;
    input.validate()?;
    Ok(input)
}

/// Deserialize a procedure input without validation rules
pub(crate) fn decode<T: DeserializeOwned>(payload: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(payload).map_err(|e| AppError::invalid(format!("Malformed input: {e}")))
}

/// Unknown procedure name under a known service
pub(crate) fn unknown_procedure(procedure: &str) -> RpcResult {
    respond::<()>(Err(AppError::not_found(format!("Procedure {procedure}"))))
}
