//! In-memory payment provider for development and tests
//!
//! Created intents start out `requires_confirmation`; tests drive them
//! to a terminal status with [`MockProvider::succeed`] or
//! [`MockProvider::fail`] before the service confirms.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use shared::{AppError, AppResult};

use super::{PaymentProvider, ProviderIntent, ProviderRefund};

#[derive(Default)]
pub struct MockProvider {
    intents: Mutex<HashMap<String, ProviderIntent>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an intent succeeded and attach a charge id
    pub fn succeed(&self, intent_id: &str) {
        let mut intents = self.intents.lock().unwrap();
        if let Some(intent) = intents.get_mut(intent_id) {
            intent.status = "succeeded".into();
            intent.charge_id = Some(format!("ch_mock_{}", Uuid::new_v4().simple()));
        }
    }

    /// Mark an intent failed
    pub fn fail(&self, intent_id: &str) {
        let mut intents = self.intents.lock().unwrap();
        if let Some(intent) = intents.get_mut(intent_id) {
            intent.status = "payment_failed".into();
        }
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_intent(
        &self,
        _amount_cents: i64,
        _currency: &str,
        _metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderIntent> {
        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = ProviderIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret")),
            status: "requires_confirmation".into(),
            charge_id: None,
        };
        self.intents.lock().unwrap().insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<ProviderIntent> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Payment intent"))
    }

    async fn create_refund(
        &self,
        _charge_id: &str,
        _amount_cents: i64,
        _reason: Option<&str>,
    ) -> AppResult<ProviderRefund> {
        Ok(ProviderRefund {
            id: format!("re_mock_{}", Uuid::new_v4().simple()),
            status: "succeeded".into(),
        })
    }
}
