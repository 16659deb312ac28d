//! Per-service shared state

use std::sync::Arc;

use shared::JwtService;

use crate::core::Config;
use crate::db::DbService;
use crate::payments::PaymentProvider;

/// State handed to one service's router
#[derive(Clone)]
pub struct ServiceState {
    pub config: Arc<Config>,
    pub db: DbService,
    pub jwt: JwtService,
    /// Set only for the payment service
    pub provider: Option<Arc<dyn PaymentProvider>>,
}

impl ServiceState {
    pub fn new(config: Arc<Config>, db: DbService) -> Self {
        let jwt = JwtService::new(&config.jwt);
        Self {
            config,
            db,
            jwt,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}
