use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::request::ServiceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Idle,
    Assigned,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub service: ServiceKind,
    pub subcategory: Option<String>,
    pub enabled_classes: HashMap<String, bool>,
    pub service_classes: Vec<String>,
    pub certifications: Vec<String>,
    pub skills: Vec<String>,
    pub vehicle_type: Option<String>,
    pub vehicle_capacity: u32,
    pub location: GeoPoint,
    pub active: bool,
    pub online: bool,
    pub availability: Availability,
    pub assigned_request: Option<Uuid>,
    pub rating: Option<f64>,
    pub completed_orders: u32,
    pub avg_response_secs: Option<f64>,
    pub completion_rate: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    pub fn new(name: impl Into<String>, service: ServiceKind, location: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            service,
            subcategory: None,
            enabled_classes: HashMap::new(),
            service_classes: Vec::new(),
            certifications: Vec::new(),
            skills: Vec::new(),
            vehicle_type: None,
            vehicle_capacity: 1,
            location,
            active: true,
            online: true,
            availability: Availability::Available,
            assigned_request: None,
            rating: None,
            completed_orders: 0,
            avg_response_secs: None,
            completion_rate: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_dispatchable(&self) -> bool {
        self.active
            && self.online
            && matches!(self.availability, Availability::Available | Availability::Idle)
            && self.assigned_request.is_none()
    }
}
