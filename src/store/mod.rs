pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::attempt::DispatchAttemptRecord;
use crate::models::provider::Provider;
use crate::models::request::{DispatchRequest, RequestStatus};

pub use memory::InMemoryStore;

#[derive(Debug, Clone)]
pub struct Termination {
    pub request: DispatchRequest,
    pub released_provider: Option<Uuid>,
}

/// Document-store boundary for requests, providers and the attempt trail.
///
/// The conditional operations verify their preconditions and apply their
/// writes in one transaction; a lost race surfaces as
/// [`StoreError::PreconditionFailed`] and must leave both records untouched.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    async fn get_request(&self, id: Uuid) -> Result<Option<DispatchRequest>, StoreError>;

    async fn put_request(&self, request: &DispatchRequest) -> Result<(), StoreError>;

    async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>, StoreError>;

    async fn put_provider(&self, provider: &Provider) -> Result<(), StoreError>;

    /// Write `offer` (a Dispatched request record) and hold its provider, iff
    /// the stored request is still Searching on the same attempt and the
    /// provider is still dispatchable.
    async fn commit_assignment(
        &self,
        offer: &DispatchRequest,
        provider_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Dispatched -> Accepted, provider Assigned -> Busy, iff `provider_id`
    /// still owns the offer.
    async fn confirm_assignment(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<DispatchRequest, StoreError>;

    /// Dispatched -> Searching and provider back to Available, iff
    /// `provider_id` still owns the offer.
    async fn release_assignment(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        message: &str,
    ) -> Result<DispatchRequest, StoreError>;

    /// Move a non-terminal request to a terminal status, releasing any held
    /// provider in the same transaction.
    async fn terminate_request(
        &self,
        request_id: Uuid,
        status: RequestStatus,
        message: &str,
    ) -> Result<Termination, StoreError>;

    async fn append_attempt(&self, record: &DispatchAttemptRecord) -> Result<(), StoreError>;

    async fn attempts_for(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<DispatchAttemptRecord>, StoreError>;

    /// Searching and Dispatched requests, for restart recovery.
    async fn requests_in_flight(&self) -> Result<Vec<DispatchRequest>, StoreError>;

    /// Pending/Searching/Dispatched requests created before `cutoff`.
    async fn stale_requests(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DispatchRequest>, StoreError>;
}
