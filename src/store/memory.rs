use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::attempt::DispatchAttemptRecord;
use crate::models::provider::{Availability, Provider};
use crate::models::request::{DispatchRequest, RequestStatus};
use crate::store::{DispatchStore, Termination};

#[derive(Default)]
struct StoreState {
    requests: HashMap<Uuid, DispatchRequest>,
    providers: HashMap<Uuid, Provider>,
    attempts: Vec<DispatchAttemptRecord>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }

    pub fn providers_snapshot(&self) -> Result<Vec<Provider>, StoreError> {
        Ok(self.state()?.providers.values().cloned().collect())
    }

    pub fn requests_snapshot(&self) -> Result<Vec<DispatchRequest>, StoreError> {
        Ok(self.state()?.requests.values().cloned().collect())
    }
}

fn release_provider(providers: &mut HashMap<Uuid, Provider>, provider_id: Uuid) {
    if let Some(provider) = providers.get_mut(&provider_id) {
        provider.availability = Availability::Available;
        provider.assigned_request = None;
        provider.updated_at = Utc::now();
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn get_request(&self, id: Uuid) -> Result<Option<DispatchRequest>, StoreError> {
        Ok(self.state()?.requests.get(&id).cloned())
    }

    async fn put_request(&self, request: &DispatchRequest) -> Result<(), StoreError> {
        self.state()?.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>, StoreError> {
        Ok(self.state()?.providers.get(&id).cloned())
    }

    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        self.state()?.providers.insert(provider.id, provider.clone());
        Ok(())
    }

    async fn commit_assignment(
        &self,
        offer: &DispatchRequest,
        provider_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;

        let stored = state
            .requests
            .get(&offer.id)
            .ok_or(StoreError::RequestNotFound(offer.id))?;
        if stored.status != RequestStatus::Searching {
            return Err(StoreError::PreconditionFailed(format!(
                "request {} is {:?}, not searching",
                offer.id, stored.status
            )));
        }
        if stored.attempt_count != offer.attempt_count {
            return Err(StoreError::PreconditionFailed(format!(
                "request {} moved to attempt {}",
                offer.id, stored.attempt_count
            )));
        }

        let provider = state
            .providers
            .get_mut(&provider_id)
            .ok_or(StoreError::ProviderNotFound(provider_id))?;
        if !provider.is_dispatchable() {
            return Err(StoreError::PreconditionFailed(format!(
                "provider {provider_id} is no longer available"
            )));
        }

        provider.availability = Availability::Assigned;
        provider.assigned_request = Some(offer.id);
        provider.updated_at = Utc::now();

        let mut committed = offer.clone();
        committed.updated_at = Utc::now();
        state.requests.insert(committed.id, committed);
        Ok(())
    }

    async fn confirm_assignment(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<DispatchRequest, StoreError> {
        let mut state = self.state()?;

        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or(StoreError::RequestNotFound(request_id))?;
        if request.status != RequestStatus::Dispatched
            || request.assigned_provider != Some(provider_id)
        {
            return Err(StoreError::PreconditionFailed(format!(
                "request {request_id} is not dispatched to provider {provider_id}"
            )));
        }

        request.status = RequestStatus::Accepted;
        request.status_message = Some("provider accepted request".to_string());
        request.response_deadline = None;
        request.updated_at = Utc::now();
        let updated = request.clone();

        if let Some(provider) = state.providers.get_mut(&provider_id) {
            provider.availability = Availability::Busy;
            provider.assigned_request = Some(request_id);
            provider.updated_at = Utc::now();
        }

        Ok(updated)
    }

    async fn release_assignment(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        message: &str,
    ) -> Result<DispatchRequest, StoreError> {
        let mut state = self.state()?;

        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or(StoreError::RequestNotFound(request_id))?;
        if request.status != RequestStatus::Dispatched
            || request.assigned_provider != Some(provider_id)
        {
            return Err(StoreError::PreconditionFailed(format!(
                "request {request_id} is not dispatched to provider {provider_id}"
            )));
        }

        request.status = RequestStatus::Searching;
        request.status_message = Some(message.to_string());
        request.assigned_provider = None;
        request.assigned_distance_km = None;
        request.assigned_score = None;
        request.response_deadline = None;
        request.updated_at = Utc::now();
        let updated = request.clone();

        release_provider(&mut state.providers, provider_id);

        Ok(updated)
    }

    async fn terminate_request(
        &self,
        request_id: Uuid,
        status: RequestStatus,
        message: &str,
    ) -> Result<Termination, StoreError> {
        let mut state = self.state()?;

        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or(StoreError::RequestNotFound(request_id))?;
        if request.status.is_terminal() {
            return Err(StoreError::PreconditionFailed(format!(
                "request {request_id} already terminal ({:?})",
                request.status
            )));
        }

        let released_provider = request.assigned_provider.take();
        request.status = status;
        request.status_message = Some(message.to_string());
        request.response_deadline = None;
        request.updated_at = Utc::now();
        let updated = request.clone();

        if let Some(provider_id) = released_provider {
            release_provider(&mut state.providers, provider_id);
        }

        Ok(Termination {
            request: updated,
            released_provider,
        })
    }

    async fn append_attempt(&self, record: &DispatchAttemptRecord) -> Result<(), StoreError> {
        self.state()?.attempts.push(record.clone());
        Ok(())
    }

    async fn attempts_for(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<DispatchAttemptRecord>, StoreError> {
        Ok(self
            .state()?
            .attempts
            .iter()
            .filter(|record| record.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn requests_in_flight(&self) -> Result<Vec<DispatchRequest>, StoreError> {
        Ok(self
            .state()?
            .requests
            .values()
            .filter(|request| {
                matches!(
                    request.status,
                    RequestStatus::Searching | RequestStatus::Dispatched
                )
            })
            .cloned()
            .collect())
    }

    async fn stale_requests(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DispatchRequest>, StoreError> {
        Ok(self
            .state()?
            .requests
            .values()
            .filter(|request| {
                matches!(
                    request.status,
                    RequestStatus::Pending | RequestStatus::Searching | RequestStatus::Dispatched
                ) && request.created_at < cutoff
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::models::request::ServiceKind;

    fn request() -> DispatchRequest {
        let mut request = DispatchRequest::new(
            ServiceKind::Transport,
            "standard",
            GeoPoint::new(6.5244, 3.3792),
        );
        request.status = RequestStatus::Searching;
        request.attempt_count = 1;
        request
    }

    fn provider() -> Provider {
        Provider::new("driver", ServiceKind::Transport, GeoPoint::new(6.53, 3.38))
    }

    fn offer_for(request: &DispatchRequest, provider_id: Uuid) -> DispatchRequest {
        let mut offer = request.clone();
        offer.status = RequestStatus::Dispatched;
        offer.assigned_provider = Some(provider_id);
        offer.attempted_providers.push(provider_id);
        offer
    }

    #[tokio::test]
    async fn commit_holds_provider_and_writes_offer() {
        let store = InMemoryStore::new();
        let request = request();
        let provider = provider();
        store.put_request(&request).await.unwrap();
        store.put_provider(&provider).await.unwrap();

        let offer = offer_for(&request, provider.id);
        store.commit_assignment(&offer, provider.id).await.unwrap();

        let stored = store.get_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Dispatched);
        assert_eq!(stored.assigned_provider, Some(provider.id));

        let held = store.get_provider(provider.id).await.unwrap().unwrap();
        assert_eq!(held.availability, Availability::Assigned);
        assert_eq!(held.assigned_request, Some(request.id));
    }

    #[tokio::test]
    async fn commit_fails_when_provider_already_held() {
        let store = InMemoryStore::new();
        let first = request();
        let second = request();
        let provider = provider();
        store.put_request(&first).await.unwrap();
        store.put_request(&second).await.unwrap();
        store.put_provider(&provider).await.unwrap();

        store
            .commit_assignment(&offer_for(&first, provider.id), provider.id)
            .await
            .unwrap();

        let result = store
            .commit_assignment(&offer_for(&second, provider.id), provider.id)
            .await;
        assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));

        let stored = store.get_request(second.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Searching);
        assert!(stored.assigned_provider.is_none());
    }

    #[tokio::test]
    async fn commit_fails_when_attempt_moved_on() {
        let store = InMemoryStore::new();
        let request = request();
        let provider = provider();
        store.put_request(&request).await.unwrap();
        store.put_provider(&provider).await.unwrap();

        let mut stale_offer = offer_for(&request, provider.id);
        stale_offer.attempt_count = 0;

        let result = store.commit_assignment(&stale_offer, provider.id).await;
        assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn confirm_marks_provider_busy() {
        let store = InMemoryStore::new();
        let request = request();
        let provider = provider();
        store.put_request(&request).await.unwrap();
        store.put_provider(&provider).await.unwrap();
        store
            .commit_assignment(&offer_for(&request, provider.id), provider.id)
            .await
            .unwrap();

        let confirmed = store
            .confirm_assignment(request.id, provider.id)
            .await
            .unwrap();
        assert_eq!(confirmed.status, RequestStatus::Accepted);
        assert!(confirmed.response_deadline.is_none());

        let busy = store.get_provider(provider.id).await.unwrap().unwrap();
        assert_eq!(busy.availability, Availability::Busy);
        assert_eq!(busy.assigned_request, Some(request.id));
    }

    #[tokio::test]
    async fn confirm_from_wrong_provider_is_rejected() {
        let store = InMemoryStore::new();
        let request = request();
        let provider = provider();
        store.put_request(&request).await.unwrap();
        store.put_provider(&provider).await.unwrap();
        store
            .commit_assignment(&offer_for(&request, provider.id), provider.id)
            .await
            .unwrap();

        let result = store.confirm_assignment(request.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn release_returns_request_to_searching_and_frees_provider() {
        let store = InMemoryStore::new();
        let request = request();
        let provider = provider();
        store.put_request(&request).await.unwrap();
        store.put_provider(&provider).await.unwrap();
        store
            .commit_assignment(&offer_for(&request, provider.id), provider.id)
            .await
            .unwrap();

        let released = store
            .release_assignment(request.id, provider.id, "provider declined")
            .await
            .unwrap();
        assert_eq!(released.status, RequestStatus::Searching);
        assert!(released.assigned_provider.is_none());
        assert_eq!(released.attempted_providers, vec![provider.id]);

        let freed = store.get_provider(provider.id).await.unwrap().unwrap();
        assert_eq!(freed.availability, Availability::Available);
        assert!(freed.assigned_request.is_none());
    }

    #[tokio::test]
    async fn terminate_releases_held_provider() {
        let store = InMemoryStore::new();
        let request = request();
        let provider = provider();
        store.put_request(&request).await.unwrap();
        store.put_provider(&provider).await.unwrap();
        store
            .commit_assignment(&offer_for(&request, provider.id), provider.id)
            .await
            .unwrap();

        let termination = store
            .terminate_request(request.id, RequestStatus::Cancelled, "cancelled by customer")
            .await
            .unwrap();
        assert_eq!(termination.request.status, RequestStatus::Cancelled);
        assert_eq!(termination.released_provider, Some(provider.id));

        let freed = store.get_provider(provider.id).await.unwrap().unwrap();
        assert_eq!(freed.availability, Availability::Available);
    }

    #[tokio::test]
    async fn terminate_twice_is_a_precondition_failure() {
        let store = InMemoryStore::new();
        let request = request();
        store.put_request(&request).await.unwrap();

        store
            .terminate_request(request.id, RequestStatus::Expired, "expired")
            .await
            .unwrap();
        let result = store
            .terminate_request(request.id, RequestStatus::Cancelled, "cancelled")
            .await;
        assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn stale_requests_respects_status_and_cutoff() {
        let store = InMemoryStore::new();

        let mut old = request();
        old.created_at = Utc::now() - chrono::Duration::hours(30);
        let mut fresh = request();
        fresh.created_at = Utc::now();
        let mut done = request();
        done.created_at = Utc::now() - chrono::Duration::hours(30);
        done.status = RequestStatus::Accepted;

        store.put_request(&old).await.unwrap();
        store.put_request(&fresh).await.unwrap();
        store.put_request(&done).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let stale = store.stale_requests(cutoff, 100).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }

    #[tokio::test]
    async fn attempts_are_append_only_per_request() {
        use crate::models::attempt::{AttemptOutcome, DispatchAttemptRecord};

        let store = InMemoryStore::new();
        let request_id = Uuid::new_v4();
        let provider_id = Uuid::new_v4();

        store
            .append_attempt(&DispatchAttemptRecord::new(
                request_id,
                provider_id,
                AttemptOutcome::Dispatched,
                1,
            ))
            .await
            .unwrap();
        store
            .append_attempt(&DispatchAttemptRecord::new(
                request_id,
                provider_id,
                AttemptOutcome::TimedOut,
                1,
            ))
            .await
            .unwrap();
        store
            .append_attempt(&DispatchAttemptRecord::new(
                Uuid::new_v4(),
                provider_id,
                AttemptOutcome::Dispatched,
                1,
            ))
            .await
            .unwrap();

        let trail = store.attempts_for(request_id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].outcome, AttemptOutcome::Dispatched);
        assert_eq!(trail[1].outcome, AttemptOutcome::TimedOut);
    }
}
