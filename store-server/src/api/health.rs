//! Health endpoint

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::core::ServiceKind;

/// `GET /health` listing the services hosted by this process
pub fn router(services: &[ServiceKind]) -> Router {
    let names: Vec<&'static str> = services.iter().map(|s| s.as_str()).collect();
    Router::new().route(
        "/health",
        get(move || {
            let names = names.clone();
            async move { health(names) }
        }),
    )
}

fn health(services: Vec<&'static str>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "services": services,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
