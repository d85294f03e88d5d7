use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::geo::{GeoPoint, haversine_km};
use crate::models::provider::{Availability, Provider};
use crate::models::request::ServiceKind;
use crate::store::InMemoryStore;

#[derive(Debug, Clone)]
pub struct ProviderFilter {
    pub service: ServiceKind,
    pub active: bool,
    pub online: bool,
    pub availability: Vec<Availability>,
    pub limit: usize,
}

impl ProviderFilter {
    pub fn dispatchable(service: ServiceKind, limit: usize) -> Self {
        Self {
            service,
            active: true,
            online: true,
            availability: vec![Availability::Available, Availability::Idle],
            limit,
        }
    }

    fn matches(&self, provider: &Provider) -> bool {
        provider.service == self.service
            && provider.active == self.active
            && provider.online == self.online
            && self.availability.contains(&provider.availability)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSnapshot {
    pub provider: Provider,
    pub distance_km: f64,
}

/// Radius lookup over the provider fleet. Results come back nearest first,
/// truncated to the filter's limit.
#[async_trait]
pub trait GeoIndex: Send + Sync {
    async fn query_near(
        &self,
        center: GeoPoint,
        radius_km: f64,
        filter: &ProviderFilter,
    ) -> Result<Vec<ProviderSnapshot>, StoreError>;
}

pub struct InMemoryGeoIndex {
    store: Arc<InMemoryStore>,
}

impl InMemoryGeoIndex {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GeoIndex for InMemoryGeoIndex {
    async fn query_near(
        &self,
        center: GeoPoint,
        radius_km: f64,
        filter: &ProviderFilter,
    ) -> Result<Vec<ProviderSnapshot>, StoreError> {
        let mut hits: Vec<ProviderSnapshot> = self
            .store
            .providers_snapshot()?
            .into_iter()
            .filter(|provider| filter.matches(provider))
            .filter_map(|provider| {
                let distance_km = haversine_km(center, provider.location);
                (distance_km <= radius_km).then_some(ProviderSnapshot {
                    provider,
                    distance_km,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        hits.truncate(filter.limit);
        Ok(hits)
    }
}
