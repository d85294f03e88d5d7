use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Transport,
    Emergency,
    Moving,
    Hire,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Transport => "transport",
            ServiceKind::Emergency => "emergency",
            ServiceKind::Moving => "moving",
            ServiceKind::Hire => "hire",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Searching,
    Dispatched,
    Accepted,
    Failed,
    Expired,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Accepted
                | RequestStatus::Failed
                | RequestStatus::Expired
                | RequestStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub id: Uuid,
    pub service: ServiceKind,
    pub service_class: String,
    pub customer_location: GeoPoint,
    pub priority: Priority,
    pub status: RequestStatus,
    pub status_message: Option<String>,
    pub attempt_count: u32,
    pub attempted_providers: Vec<Uuid>,
    pub assigned_provider: Option<Uuid>,
    pub assigned_distance_km: Option<f64>,
    pub assigned_score: Option<f64>,
    pub search_radius_km: f64,
    pub response_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DispatchRequest {
    pub fn new(service: ServiceKind, service_class: impl Into<String>, location: GeoPoint) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            service,
            service_class: service_class.into(),
            customer_location: location,
            priority: Priority::default(),
            status: RequestStatus::Pending,
            status_message: None,
            attempt_count: 0,
            attempted_providers: Vec::new(),
            assigned_provider: None,
            assigned_distance_km: None,
            assigned_score: None,
            search_radius_km: 0.0,
            response_deadline: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
