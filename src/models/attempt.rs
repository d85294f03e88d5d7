use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Dispatched,
    Accepted,
    Declined,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAttemptRecord {
    pub request_id: Uuid,
    pub provider_id: Uuid,
    pub outcome: AttemptOutcome,
    pub attempt: u32,
    pub recorded_at: DateTime<Utc>,
}

impl DispatchAttemptRecord {
    pub fn new(request_id: Uuid, provider_id: Uuid, outcome: AttemptOutcome, attempt: u32) -> Self {
        Self {
            request_id,
            provider_id,
            outcome,
            attempt,
            recorded_at: Utc::now(),
        }
    }
}
