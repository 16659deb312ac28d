use std::net::SocketAddr;

use gateway::{GatewayConfig, GatewayState, router, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_environment();

    let config = GatewayConfig::from_env();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let app = router(GatewayState::new(config));

    tracing::info!("Gateway starting on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down...");
    })
    .await?;

    Ok(())
}
