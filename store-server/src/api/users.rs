//! User service RPC surface
//!
//! Registration and login live under `/api/auth/` so the gateway can
//! leave them unauthenticated; profile and address procedures sit under
//! `/api/users/`.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::core::ServiceState;
use crate::services::UserService;

use super::{RpcResult, decode, parse, respond, unknown_procedure};

pub fn router(state: ServiceState) -> Router {
    let service = UserService::new(state.db.clone(), state.jwt.clone());
    Router::new()
        .route("/api/auth/rpc/{procedure}", post(dispatch_auth))
        .route("/api/users/rpc/{procedure}", post(dispatch))
        .with_state(service)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdArg {
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileArgs {
    user_id: String,
    #[serde(flatten)]
    update: shared::models::ProfileUpdate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressDeleteArgs {
    user_id: String,
    address_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressUpdateArgs {
    user_id: String,
    address_id: String,
    data: shared::models::AddressUpdate,
}

#[derive(Deserialize)]
struct TokenArg {
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogoutArgs {
    user_id: String,
    token: String,
}

async fn dispatch_auth(
    State(service): State<UserService>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    match procedure.as_str() {
        "register" => respond(async { service.register(parse(payload)?).await }.await),
        "login" => respond(async { service.login(parse(payload)?).await }.await),
        "verifyToken" => respond(
            async {
                let args: TokenArg = decode(payload)?;
                service.verify_token(&args.token)
            }
            .await,
        ),
        other => unknown_procedure(other),
    }
}

async fn dispatch(
    State(service): State<UserService>,
    Path(procedure): Path<String>,
    Json(payload): Json<Value>,
) -> RpcResult {
    match procedure.as_str() {
        "getProfile" => respond(
            async {
                let args: UserIdArg = decode(payload)?;
                service.get_user(&args.user_id).await
            }
            .await,
        ),
        "updateProfile" => respond(
            async {
                let args: ProfileArgs = decode(payload)?;
                service.update_profile(&args.user_id, args.update).await
            }
            .await,
        ),
        "addAddress" => respond(async { service.add_address(parse(payload)?).await }.await),
        "updateAddress" => respond(
            async {
                let args: AddressUpdateArgs = decode(payload)?;
                service
                    .update_address(&args.user_id, &args.address_id, args.data)
                    .await
            }
            .await,
        ),
        "getAddresses" => respond(
            async {
                let args: UserIdArg = decode(payload)?;
                service.get_addresses(&args.user_id).await
            }
            .await,
        ),
        "deleteAddress" => respond(
            async {
                let args: AddressDeleteArgs = decode(payload)?;
                service.delete_address(&args.user_id, &args.address_id).await
            }
            .await,
        ),
        "logout" => respond(
            async {
                let args: LogoutArgs = decode(payload)?;
                service.logout(&args.user_id, &args.token).await
            }
            .await,
        ),
        other => unknown_procedure(other),
    }
}
