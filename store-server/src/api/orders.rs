//! Order service RPC surface

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use shared::OrderStatus;

use crate::core::ServiceState;
use crate::services::OrderService;

use super::{RpcResult, decode, parse, respond, unknown_procedure};

pub fn router(state: ServiceState) -> Router {
    let service = OrderService::new(state.db.clone());
    Router::new()
        .route("/api/orders/rpc/{procedure}", post(dispatch))
        .with_state(service)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderIdArg {
    order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserOrdersArgs {
    user_id: String,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdateArgs {
    order_id: String,
    status: OrderStatus,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelArgs {
    order_id: String,
    #[serde(default)]
    reason: Option<String>,
}

async fn dispatch(
    State(service): State<OrderService>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    match procedure.as_str() {
        "create" => respond(async { service.create(parse(payload)?).await }.await),
        "getOrder" => respond(
            async {
                let args: OrderIdArg = decode(payload)?;
                service.get_order(&args.order_id).await
            }
            .await,
        ),
        "getUserOrders" => respond(
            async {
                let args: UserOrdersArgs = decode(payload)?;
                service
                    .get_user_orders(&args.user_id, args.limit, args.offset)
                    .await
            }
            .await,
        ),
        "updateStatus" => respond(
            async {
                let args: StatusUpdateArgs = decode(payload)?;
                service
                    .update_status(&args.order_id, args.status, args.comment)
                    .await
            }
            .await,
        ),
        "cancel" => respond(
            async {
                let args: CancelArgs = decode(payload)?;
                service.cancel(&args.order_id, args.reason).await
            }
            .await,
        ),
        "getHistory" => respond(
            async {
                let args: OrderIdArg = decode(payload)?;
                service.get_history(&args.order_id).await
            }
            .await,
        ),
        other => unknown_procedure(other),
    }
}
