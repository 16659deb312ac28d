//! Request forwarding
//!
//! The gateway owns a static route table mapping path prefixes to
//! upstream services and their auth requirements. Everything else about
//! the request passes through untouched, minus hop-by-hop headers, plus
//! `x-user-id` (verified caller) and `x-forwarded-for`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::json;
use tower_http::trace::TraceLayer;

use shared::JwtService;

use crate::auth::{AuthMode, authenticate};
use crate::config::GatewayConfig;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Headers that must not be forwarded in either direction
const HOP_BY_HOP: [HeaderName; 6] = [
    header::HOST,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::PROXY_AUTHORIZATION,
];

#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub jwt: JwtService,
    pub client: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        let jwt = JwtService::new(&config.jwt);
        Self {
            config: Arc::new(config),
            jwt,
            client: reqwest::Client::new(),
        }
    }

    /// Upstream base URL and auth mode for a request path
    fn route_for(&self, path: &str) -> Option<(&str, AuthMode)> {
        // provider webhooks carry their own signature, not a user token
        if path == "/api/payments/webhook" {
            return Some((&self.config.payment_url, AuthMode::None));
        }

        let table: [(&str, &str, AuthMode); 9] = [
            ("/api/auth", &self.config.user_url, AuthMode::None),
            ("/api/users", &self.config.user_url, AuthMode::Required),
            ("/api/products", &self.config.product_url, AuthMode::Optional),
            ("/api/categories", &self.config.product_url, AuthMode::Optional),
            ("/api/carts", &self.config.cart_url, AuthMode::Required),
            ("/api/orders", &self.config.order_url, AuthMode::Required),
            ("/api/payments", &self.config.payment_url, AuthMode::Required),
            ("/api/shipping", &self.config.shipping_url, AuthMode::Optional),
            ("/api/returns", &self.config.return_url, AuthMode::Required),
        ];

        table
            .into_iter()
            .find(|(prefix, _, _)| {
                path.strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .map(|(_, base, mode)| (base, mode))
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "gateway",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn forward(State(state): State<GatewayState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let Some((base, mode)) = state.route_for(&path) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Unknown route" })),
        )
            .into_response();
    };

    let claims = match authenticate(&state.jwt, req.headers(), mode) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    let mut url = format!("{base}{path}");
    if let Some(query) = req.uri().query() {
        url.push('?');
        url.push_str(query);
    }

    let method = req.method().clone();
    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string());
    let mut headers = req.headers().clone();
    for name in HOP_BY_HOP {
        headers.remove(&name);
    }
    if let Some(claims) = &claims {
        if let Ok(value) = HeaderValue::from_str(&claims.sub) {
            headers.insert(HeaderName::from_static("x-user-id"), value);
        }
    }
    if let Some(addr) = client_addr {
        if let Ok(value) = HeaderValue::from_str(&addr) {
            headers.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
    }

    let body = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body too large" })),
            )
                .into_response();
        }
    };

    tracing::debug!(%method, %url, user = ?claims.as_ref().map(|c| c.sub.as_str()), "Forwarding request");

    let upstream = state
        .client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    match upstream {
        Ok(response) => upstream_to_response(response).await,
        Err(e) => {
            tracing::error!(%url, error = %e, "Upstream request failed");
            gateway_error()
        }
    }
}

async fn upstream_to_response(response: reqwest::Response) -> Response {
    let status = response.status();
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if !HOP_BY_HOP.contains(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    match response.bytes().await {
        Ok(bytes) => {
            let mut out = Response::new(Body::from(bytes));
            *out.status_mut() = status;
            *out.headers_mut() = headers;
            out
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to read upstream response");
            gateway_error()
        }
    }
}

/// 502 with the gateway's own error shape
fn gateway_error() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": {
                "code": "GATEWAY_ERROR",
                "message": "Upstream service unavailable"
            }
        })),
    )
        .into_response()
}
