use std::sync::Arc;

use uuid::Uuid;

use crate::error::StoreError;
use crate::models::attempt::{AttemptOutcome, DispatchAttemptRecord};
use crate::models::request::DispatchRequest;
use crate::store::DispatchStore;

pub struct AttemptLedger {
    store: Arc<dyn DispatchStore>,
}

impl AttemptLedger {
    pub fn new(store: Arc<dyn DispatchStore>) -> Self {
        Self { store }
    }

    pub fn begin_attempt(&self, request: &mut DispatchRequest) -> u32 {
        request.attempt_count += 1;
        request.attempt_count
    }

    pub fn mark_attempted(&self, request: &mut DispatchRequest, provider_id: Uuid) -> bool {
        if request.attempted_providers.contains(&provider_id) {
            return false;
        }
        request.attempted_providers.push(provider_id);
        true
    }

    pub async fn record(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        outcome: AttemptOutcome,
        attempt: u32,
    ) -> Result<(), StoreError> {
        self.store
            .append_attempt(&DispatchAttemptRecord::new(
                request_id,
                provider_id,
                outcome,
                attempt,
            ))
            .await
    }

    pub async fn history(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<DispatchAttemptRecord>, StoreError> {
        self.store.attempts_for(request_id).await
    }
}
