use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("request {0} not found")]
    RequestNotFound(Uuid),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("engine queue closed: {0}")]
    QueueClosed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("request {0} not found")]
    RequestNotFound(Uuid),

    #[error("provider {0} not found")]
    ProviderNotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);
