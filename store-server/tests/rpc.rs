//! End-to-end RPC tests over the merged router

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use shared::JwtConfig;
use store_server::{Config, Server, ServiceKind};

async fn build_app(services: Vec<ServiceKind>, data_dir: &std::path::Path) -> Router {
    let config = Config {
        services,
        http_port: 0,
        data_dir: data_dir.to_string_lossy().into_owned(),
        jwt: JwtConfig {
            secret: "integration-test-secret-integration".to_string(),
            expiration_minutes: 60,
        },
        payment_provider: "mock".to_string(),
        stripe_secret_key: String::new(),
        stripe_webhook_secret: "whsec_test".to_string(),
        environment: "development".to_string(),
    };
    Server::new(config).build_router().await.unwrap()
}

async fn rpc(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_lists_hosted_services() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(vec![ServiceKind::Order, ServiceKind::Cart], dir.path()).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["services"], json!(["order", "cart"]));
}

#[tokio::test]
async fn service_errors_come_back_as_http_200_envelopes() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(vec![ServiceKind::Order], dir.path()).await;

    let (status, body) = rpc(
        &app,
        "/api/orders/rpc/getOrder",
        json!({ "orderId": "missing" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Order not found");
}

#[tokio::test]
async fn register_login_and_fetch_profile() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(vec![ServiceKind::User], dir.path()).await;

    let (status, body) = rpc(
        &app,
        "/api/auth/rpc/register",
        json!({ "email": "jane@example.com", "password": "hunter2hunter2" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();
    assert!(body["data"]["token"].as_str().is_some());
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let (_, body) = rpc(
        &app,
        "/api/auth/rpc/login",
        json!({ "email": "jane@example.com", "password": "hunter2hunter2" }),
    )
    .await;
    assert_eq!(body["success"], true);

    let (_, body) = rpc(&app, "/api/users/rpc/getProfile", json!({ "userId": user_id })).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "jane@example.com");
    assert_eq!(body["data"]["addresses"], json!([]));
}

#[tokio::test]
async fn order_lifecycle_over_rpc() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(vec![ServiceKind::Order], dir.path()).await;

    let address = json!({
        "street": "1 Main St",
        "city": "Springfield",
        "zipCode": "62701",
        "country": "US"
    });
    let (_, body) = rpc(
        &app,
        "/api/orders/rpc/create",
        json!({
            "userId": "user-1",
            "items": [
                { "productId": "p1", "skuId": "s1", "productName": "Widget",
                  "quantity": 2, "price": "10.00" }
            ],
            "shippingAddress": address,
            "billingAddress": address
        }),
    )
    .await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["totalAmount"], "20.00");
    assert_eq!(body["data"]["status"], "pending");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = rpc(
        &app,
        "/api/orders/rpc/cancel",
        json!({ "orderId": order_id, "reason": "typo" }),
    )
    .await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "cancelled");

    // cancelling twice violates the workflow but stays an envelope error
    let (status, body) = rpc(&app, "/api/orders/rpc/cancel", json!({ "orderId": order_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_procedure_is_an_envelope_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(vec![ServiceKind::Cart], dir.path()).await;

    let (status, body) = rpc(&app, "/api/carts/rpc/explode", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn webhook_rejects_bad_signature_and_accepts_good_one() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(vec![ServiceKind::Payment], dir.path()).await;

    let (_, body) = rpc(
        &app,
        "/api/payments/rpc/createPaymentIntent",
        json!({ "orderId": "order-1", "userId": "user-1", "amount": "25.00" }),
    )
    .await;
    assert_eq!(body["success"], true);
    let intent_id = body["data"]["providerIntentId"].as_str().unwrap().to_string();
    let payment_id = body["data"]["id"].as_str().unwrap().to_string();

    let event = json!({
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id, "latest_charge": "ch_1" } }
    })
    .to_string();

    let send = |signature: String, body: String| {
        let app = app.clone();
        async move {
            app.oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("stripe-signature", signature)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    let bad = send("t=123,v1=deadbeef".to_string(), event.clone()).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, b"whsec_test");
    let signed = format!("1700000000.{event}");
    let tag = ring::hmac::sign(&key, signed.as_bytes());
    let header = format!("t=1700000000,v1={}", hex::encode(tag.as_ref()));

    let good = send(header.clone(), event.clone()).await;
    assert_eq!(good.status(), StatusCode::OK);

    // replay acknowledges without a second transition
    let replay = send(header, event).await;
    assert_eq!(replay.status(), StatusCode::OK);

    let (_, body) = rpc(
        &app,
        "/api/payments/rpc/getPayment",
        json!({ "paymentId": payment_id }),
    )
    .await;
    assert_eq!(body["data"]["status"], "completed");
    let (_, body) = rpc(
        &app,
        "/api/payments/rpc/getHistory",
        json!({ "paymentId": body["data"]["id"] }),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}
