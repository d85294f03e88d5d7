use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotifyError;
use crate::models::request::ServiceKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchNotice {
    Offer {
        request_id: Uuid,
        service: ServiceKind,
        service_class: String,
        distance_km: f64,
        expires_at: DateTime<Utc>,
    },
    OfferWithdrawn {
        request_id: Uuid,
        reason: String,
    },
}

/// Delivery channel to providers. Delivery failures do not abort a dispatch
/// cycle; the response timeout covers a provider that never saw the offer.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, provider_id: Uuid, notice: &DispatchNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, provider_id: Uuid, notice: &DispatchNotice) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notice)
            .map_err(|e| NotifyError(format!("encode notice: {e}")))?;
        tracing::info!(%provider_id, %payload, "notify provider");
        Ok(())
    }
}
