//! Shipping service RPC surface

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::core::ServiceState;
use crate::services::ShippingService;

use super::{RpcResult, decode, parse, respond, unknown_procedure};

pub fn router(state: ServiceState) -> Router {
    let service = ShippingService::new(state.db.clone());
    Router::new()
        .route("/api/shipping/rpc/{procedure}", post(dispatch))
        .with_state(service)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentIdArg {
    shipment_id: String,
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
struct CostArgs {
    shipping_method_id: String,
    country: String,
    #[serde(default)]
    state: Option<String>,
    weight: f64,
}

async fn dispatch(
    State(service): State<ShippingService>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    match procedure.as_str() {
        "createShipment" => respond(async { service.create_shipment(parse(payload)?).await }.await),
        "getShipment" => respond(
            async {
                let args: ShipmentIdArg = decode(payload)?;
                service.get_shipment(&args.shipment_id).await
            }
            .await,
        ),
        "getOrderShipments" => respond(
            async {
                let args: OrderIdArg = decode(payload)?;
                service.get_order_shipments(&args.order_id).await
            }
            .await,
        ),
        "getUserShipments" => respond(
            async {
                let args: UserIdArg = decode(payload)?;
                service.get_user_shipments(&args.user_id).await
            }
            .await,
        ),
        "updateShipmentStatus" => {
            respond(async { service.update_status(parse(payload)?).await }.await)
        }
        "calculateShippingCost" => respond(
            async {
                let args: CostArgs = decode(payload)?;
                service
                    .calculate_cost(
                        &args.shipping_method_id,
                        &args.country,
                        args.state.as_deref(),
                        args.weight,
                    )
                    .await
            }
            .await,
        ),
        "getShippingMethods" => respond(service.get_methods().await),
        "getShipmentHistory" => respond(
            async {
                let args: ShipmentIdArg = decode(payload)?;
                service.get_history(&args.shipment_id).await
            }
            .await,
        ),
        other => unknown_procedure(other),
    }
}
