//! Server lifecycle
//!
//! One process hosts the services selected by `SERVICES`. Each hosted
//! service gets its own database pool and router; the merged router is
//! served on a single listener.

use std::sync::Arc;

use tower_http::trace::TraceLayer;

use shared::{AppError, AppResult};

use crate::api;
use crate::core::{Config, ServiceKind, ServiceState};
use crate::db::DbService;
use crate::payments::{MockProvider, PaymentProvider, StripeProvider};

/// HTTP server hosting one or more domain services
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> AppResult<()> {
        let app = self.build_router().await?;

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        tracing::info!(
            services = %self
                .config
                .services
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(","),
            "Store server starting on {addr}"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down...");
            })
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {e}")))
    }

    /// Merge routers for every hosted service plus the health endpoint
    pub async fn build_router(&self) -> AppResult<axum::Router> {
        if self.config.services.is_empty() {
            return Err(AppError::Internal("No services configured".to_string()));
        }
        std::fs::create_dir_all(&self.config.data_dir)
            .map_err(|e| AppError::Internal(format!("Failed to create data dir: {e}")))?;

        let config = Arc::new(self.config.clone());
        let mut app = api::health::router(&config.services);

        for &kind in &config.services {
            let db = DbService::new(&config.db_path(kind), kind).await?;
            let mut state = ServiceState::new(config.clone(), db);
            if kind == ServiceKind::Payment {
                state = state.with_provider(self.build_provider()?);
            }
            app = app.merge(api::service_router(kind, state)?);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    fn build_provider(&self) -> AppResult<Arc<dyn PaymentProvider>> {
        match self.config.payment_provider.as_str() {
            "stripe" => {
                if self.config.stripe_secret_key.is_empty() {
                    return Err(AppError::Internal(
                        "PAYMENT_PROVIDER=stripe requires STRIPE_SECRET_KEY".to_string(),
                    ));
                }
                tracing::info!("Using Stripe payment provider");
                Ok(Arc::new(StripeProvider::new(
                    self.config.stripe_secret_key.clone(),
                )))
            }
            "mock" => {
                if self.config.is_production() {
                    tracing::warn!("Mock payment provider is active in production");
                }
                Ok(Arc::new(MockProvider::new()))
            }
            other => Err(AppError::Internal(format!(
                "Unknown payment provider: {other}"
            ))),
        }
    }
}
