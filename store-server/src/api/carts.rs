//! Cart service RPC surface (carts and wishlists)

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::core::ServiceState;
use crate::services::CartService;

use super::{RpcResult, decode, parse, respond, unknown_procedure};

pub fn router(state: ServiceState) -> Router {
    let service = CartService::new(state.db.clone());
    Router::new()
        .route("/api/carts/rpc/{procedure}", post(dispatch))
        .with_state(service)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdArg {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartIdArg {
    cart_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuantityArgs {
    cart_id: String,
    item_id: String,
    quantity: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemArgs {
    cart_id: String,
    item_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishlistArgs {
    user_id: String,
    product_id: String,
}

async fn dispatch(
    State(service): State<CartService>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    match procedure.as_str() {
        "getOrCreate" => respond(
            async {
                let args: UserIdArg = decode(payload)?;
                service.get_or_create_cart(&args.user_id).await
            }
            .await,
        ),
        "getCart" => respond(
            async {
                let args: CartIdArg = decode(payload)?;
                service.get_cart_details(&args.cart_id).await
            }
            .await,
        ),
        "addItem" => respond(async { service.add_item(parse(payload)?).await }.await),
        "updateItemQuantity" => respond(
            async {
                let args: QuantityArgs = decode(payload)?;
                service
                    .update_item_quantity(&args.cart_id, &args.item_id, args.quantity)
                    .await
            }
            .await,
        ),
        "removeItem" => respond(
            async {
                let args: ItemArgs = decode(payload)?;
                service.remove_item(&args.cart_id, &args.item_id).await
            }
            .await,
        ),
        "clearCart" => respond(
            async {
                let args: CartIdArg = decode(payload)?;
                service.clear_cart(&args.cart_id).await
            }
            .await,
        ),
        "addToWishlist" => respond(
            async {
                let args: WishlistArgs = decode(payload)?;
                service.add_to_wishlist(&args.user_id, &args.product_id).await
            }
            .await,
        ),
        "removeFromWishlist" => respond(
            async {
                let args: WishlistArgs = decode(payload)?;
                service
                    .remove_from_wishlist(&args.user_id, &args.product_id)
                    .await
            }
            .await,
        ),
        "getWishlist" => respond(
            async {
                let args: UserIdArg = decode(payload)?;
                service.get_wishlist(&args.user_id).await
            }
            .await,
        ),
        other => unknown_procedure(other),
    }
}
