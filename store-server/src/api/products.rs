//! Product service RPC surface (catalog, SKUs, categories)

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use shared::models::ProductUpdate;

use crate::core::ServiceState;
use crate::services::ProductService;

use super::{RpcResult, decode, parse, respond, unknown_procedure};

pub fn router(state: ServiceState) -> Router {
    let service = ProductService::new(state.db.clone());
    Router::new()
        // the gateway maps both prefixes to this service
        .route("/api/products/rpc/{procedure}", post(dispatch))
        .route("/api/categories/rpc/{procedure}", post(dispatch))
        .with_state(service)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductIdArg {
    product_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkuIdArg {
    sku_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    product_id: String,
    #[serde(flatten)]
    update: ProductUpdate,
}

async fn dispatch(
    State(service): State<ProductService>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    match procedure.as_str() {
        "create" => respond(async { service.create(parse(payload)?).await }.await),
        "getById" => respond(
            async {
                let args: ProductIdArg = decode(payload)?;
                service.get_product(&args.product_id).await
            }
            .await,
        ),
        "list" => respond(async { service.list(decode(payload)?).await }.await),
        "update" => respond(
            async {
                let args: UpdateArgs = decode(payload)?;
                service.update(&args.product_id, args.update).await
            }
            .await,
        ),
        "delete" => respond(
            async {
                let args: ProductIdArg = decode(payload)?;
                service.delete(&args.product_id).await
            }
            .await,
        ),
        "createSku" => respond(async { service.create_sku(parse(payload)?).await }.await),
        "getSkus" => respond(
            async {
                let args: ProductIdArg = decode(payload)?;
                service.get_skus(&args.product_id).await
            }
            .await,
        ),
        "updateStock" => respond(async { service.update_stock(parse(payload)?).await }.await),
        "getInventoryLogs" => respond(
            async {
                let args: SkuIdArg = decode(payload)?;
                service.get_inventory_logs(&args.sku_id).await
            }
            .await,
        ),
        "getCategories" => respond(service.get_categories().await),
        "createCategory" => {
            respond(async { service.create_category(parse(payload)?).await }.await)
        }
        other => unknown_procedure(other),
    }
}
