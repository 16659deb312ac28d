//! Return service RPC surface

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use shared::Money;

use crate::core::ServiceState;
use crate::services::ReturnService;

use super::{RpcResult, decode, parse, respond, unknown_procedure};

pub fn router(state: ServiceState) -> Router {
    let service = ReturnService::new(state.db.clone());
    Router::new()
        .route("/api/returns/rpc/{procedure}", post(dispatch))
        .with_state(service)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReturnIdArg {
    return_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderIdArg {
    order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdArg {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectArgs {
    return_id: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmountArg {
    amount: Money,
}

async fn dispatch(
    State(service): State<ReturnService>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    match procedure.as_str() {
        "createReturnRequest" => {
            respond(async { service.create_request(parse(payload)?).await }.await)
        }
        "getReturn" => respond(
            async {
                let args: ReturnIdArg = decode(payload)?;
                service.get_request(&args.return_id).await
            }
            .await,
        ),
        "getOrderReturns" => respond(
            async {
                let args: OrderIdArg = decode(payload)?;
                service.get_order_returns(&args.order_id).await
            }
            .await,
        ),
        "getUserReturns" => respond(
            async {
                let args: UserIdArg = decode(payload)?;
                service.get_user_requests(&args.user_id).await
            }
            .await,
        ),
        "approveReturn" => respond(async { service.approve(parse(payload)?).await }.await),
        "rejectReturn" => respond(
            async {
                let args: RejectArgs = decode(payload)?;
                service.reject(&args.return_id, args.reason).await
            }
            .await,
        ),
        "updateReturnStatus" => {
            respond(async { service.update_status(parse(payload)?).await }.await)
        }
        "calculateRefundAmount" => respond(
            async {
                let args: AmountArg = decode(payload)?;
                service.calculate_refund(args.amount).await
            }
            .await,
        ),
        "getReturnReasons" => respond(service.get_reasons().await),
        "getReturnPolicies" => respond(service.get_policies().await),
        "getReturnHistory" => respond(
            async {
                let args: ReturnIdArg = decode(payload)?;
                service.get_history(&args.return_id).await
            }
            .await,
        ),
        other => unknown_procedure(other),
    }
}
