use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::config::DispatchConfig;
use crate::engine::eligibility;
use crate::engine::ledger::AttemptLedger;
use crate::engine::queue::{self, EngineCommand};
use crate::engine::scoring::{ScoreBreakdown, compute_score};
use crate::engine::timeout::TimeoutScheduler;
use crate::error::{DispatchError, StoreError};
use crate::geo::index::{GeoIndex, ProviderFilter, ProviderSnapshot};
use crate::models::attempt::{AttemptOutcome, DispatchAttemptRecord};
use crate::models::request::{DispatchRequest, RequestStatus};
use crate::notify::{DispatchNotice, Notifier};
use crate::observability::Metrics;
use crate::store::DispatchStore;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Assigned {
        provider_id: Uuid,
        attempt: u32,
        score: f64,
    },
    RetryScheduled {
        attempt: u32,
        delay: Duration,
    },
    Exhausted {
        attempts: u32,
    },
    Skipped,
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Assigned { .. } => "assigned",
            Self::RetryScheduled { .. } => "retry",
            Self::Exhausted { .. } => "exhausted",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Applied,
    Ignored,
}

pub struct DispatchEngine {
    store: Arc<dyn DispatchStore>,
    geo: Arc<dyn GeoIndex>,
    notifier: Arc<dyn Notifier>,
    ledger: AttemptLedger,
    timeouts: Arc<TimeoutScheduler>,
    config: DispatchConfig,
    commands: mpsc::Sender<EngineCommand>,
    metrics: Metrics,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        geo: Arc<dyn GeoIndex>,
        notifier: Arc<dyn Notifier>,
        config: DispatchConfig,
    ) -> (Arc<Self>, mpsc::Receiver<EngineCommand>) {
        let (tx, rx) = mpsc::channel(config.command_queue_size);
        let metrics = Metrics::new();
        let timeouts = TimeoutScheduler::new(tx.clone(), metrics.clone());
        let ledger = AttemptLedger::new(Arc::clone(&store));

        let engine = Arc::new(Self {
            store,
            geo,
            notifier,
            ledger,
            timeouts,
            config,
            commands: tx,
            metrics,
        });
        (engine, rx)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn submit(&self, request: DispatchRequest) -> Result<Uuid, DispatchError> {
        if let Some(problem) = validation_problem(&request) {
            return Err(DispatchError::Validation(problem));
        }

        let request_id = request.id;
        self.store.put_request(&request).await?;
        info!(
            %request_id,
            service = %request.service,
            service_class = %request.service_class,
            "request submitted"
        );

        self.enqueue_dispatch(request_id).await?;
        Ok(request_id)
    }

    pub async fn enqueue_dispatch(&self, request_id: Uuid) -> Result<(), DispatchError> {
        queue::enqueue(
            &self.commands,
            &self.metrics,
            EngineCommand::Dispatch { request_id },
        )
        .await
    }

    pub async fn dispatch(&self, request_id: Uuid) -> Result<DispatchOutcome, DispatchError> {
        let Some(mut request) = self.store.get_request(request_id).await? else {
            return Err(DispatchError::RequestNotFound(request_id));
        };

        if !matches!(
            request.status,
            RequestStatus::Pending | RequestStatus::Searching
        ) {
            debug!(%request_id, status = ?request.status, "dispatch cycle skipped");
            return Ok(DispatchOutcome::Skipped);
        }

        if let Some(problem) = validation_problem(&request) {
            self.store
                .terminate_request(request_id, RequestStatus::Failed, &problem)
                .await?;
            self.timeouts.cancel(request_id);
            warn!(%request_id, %problem, "request failed validation");
            return Err(DispatchError::Validation(problem));
        }

        let entering_flight = request.status == RequestStatus::Pending;
        let attempt = self.ledger.begin_attempt(&mut request);

        if attempt > self.config.max_attempts {
            self.store
                .terminate_request(request_id, RequestStatus::Failed, "no providers available")
                .await?;
            self.timeouts.cancel(request_id);
            if !entering_flight {
                self.metrics.requests_in_flight.dec();
            }
            warn!(%request_id, attempt, "dispatch attempts exhausted");
            return Ok(DispatchOutcome::Exhausted { attempts: attempt });
        }

        let radius_km = self.config.search_radius_km(request.service, attempt);
        request.status = RequestStatus::Searching;
        request.status_message = Some("finding a provider".to_string());
        request.search_radius_km = radius_km;
        request.updated_at = Utc::now();
        self.store.put_request(&request).await?;
        if entering_flight {
            self.metrics.requests_in_flight.inc();
        }

        let filter = ProviderFilter::dispatchable(request.service, self.config.candidate_limit);
        let nearby = self
            .geo
            .query_near(request.customer_location, radius_km, &filter)
            .await?;

        let ranked = rank_candidates(&request, nearby, self.config.offer_limit);
        debug!(
            %request_id,
            attempt,
            radius_km,
            candidates = ranked.len(),
            "candidates ranked"
        );

        if ranked.is_empty() {
            return self.conclude_empty_attempt(&request, attempt).await;
        }

        let response_timeout = self
            .config
            .response_timeout_for(request.service, request.priority);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(response_timeout)
                .map_err(|err| DispatchError::Config(format!("response timeout: {err}")))?;

        for (candidate, score, breakdown) in ranked {
            let provider_id = candidate.provider.id;

            let mut offer = request.clone();
            offer.status = RequestStatus::Dispatched;
            offer.status_message = Some("provider assigned".to_string());
            offer.assigned_provider = Some(provider_id);
            offer.assigned_distance_km = Some(candidate.distance_km);
            offer.assigned_score = Some(score);
            offer.response_deadline = Some(expires_at);
            self.ledger.mark_attempted(&mut offer, provider_id);

            match self.store.commit_assignment(&offer, provider_id).await {
                Ok(()) => {
                    self.timeouts
                        .arm_response_deadline(request_id, attempt, response_timeout);
                    self.record_attempt(
                        request_id,
                        provider_id,
                        AttemptOutcome::Dispatched,
                        attempt,
                    )
                    .await;

                    let notice = DispatchNotice::Offer {
                        request_id,
                        service: request.service,
                        service_class: request.service_class.clone(),
                        distance_km: candidate.distance_km,
                        expires_at,
                    };
                    if let Err(err) = self.notifier.send(provider_id, &notice).await {
                        warn!(%request_id, %provider_id, error = %err, "offer notification failed");
                    }

                    info!(
                        %request_id,
                        %provider_id,
                        attempt,
                        score,
                        distance_km = candidate.distance_km,
                        "request dispatched"
                    );
                    debug!(%request_id, %provider_id, ?breakdown, "winning score breakdown");
                    return Ok(DispatchOutcome::Assigned {
                        provider_id,
                        attempt,
                        score,
                    });
                }
                Err(StoreError::PreconditionFailed(reason)) => {
                    self.metrics.commit_conflicts_total.inc();
                    debug!(%request_id, %provider_id, %reason, "assignment commit lost");

                    let Some(current) = self.store.get_request(request_id).await? else {
                        return Err(DispatchError::RequestNotFound(request_id));
                    };
                    if current.status != RequestStatus::Searching
                        || current.attempt_count != attempt
                    {
                        return Ok(DispatchOutcome::Skipped);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.conclude_empty_attempt(&request, attempt).await
    }

    async fn conclude_empty_attempt(
        &self,
        request: &DispatchRequest,
        attempt: u32,
    ) -> Result<DispatchOutcome, DispatchError> {
        if attempt >= self.config.max_attempts {
            self.store
                .terminate_request(
                    request.id,
                    RequestStatus::Failed,
                    "no providers available in area",
                )
                .await?;
            self.timeouts.cancel(request.id);
            self.metrics.requests_in_flight.dec();
            warn!(request_id = %request.id, attempt, "dispatch attempts exhausted");
            return Ok(DispatchOutcome::Exhausted { attempts: attempt });
        }

        let delay = self.config.retry_delay;
        self.timeouts.schedule_redispatch(request.id, delay);
        info!(
            request_id = %request.id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "no eligible providers, retry scheduled"
        );
        Ok(DispatchOutcome::RetryScheduled { attempt, delay })
    }

    async fn record_attempt(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        outcome: AttemptOutcome,
        attempt: u32,
    ) {
        if let Err(err) = self
            .ledger
            .record(request_id, provider_id, outcome, attempt)
            .await
        {
            warn!(%request_id, %provider_id, ?outcome, error = %err, "attempt record dropped");
        }
    }

    pub async fn on_provider_accept(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
    ) -> Result<SignalOutcome, DispatchError> {
        match self.store.confirm_assignment(request_id, provider_id).await {
            Ok(request) => {
                self.timeouts.cancel(request_id);
                self.record_attempt(
                    request_id,
                    provider_id,
                    AttemptOutcome::Accepted,
                    request.attempt_count,
                )
                .await;
                self.metrics
                    .provider_responses_total
                    .with_label_values(&["accepted"])
                    .inc();
                self.metrics.requests_in_flight.dec();
                info!(%request_id, %provider_id, attempt = request.attempt_count, "provider accepted");
                Ok(SignalOutcome::Applied)
            }
            Err(StoreError::PreconditionFailed(reason)) => {
                self.metrics
                    .provider_responses_total
                    .with_label_values(&["ignored"])
                    .inc();
                debug!(%request_id, %provider_id, %reason, "stale accept ignored");
                Ok(SignalOutcome::Ignored)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn on_provider_decline(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        reason: &str,
    ) -> Result<SignalOutcome, DispatchError> {
        match self
            .store
            .release_assignment(request_id, provider_id, "finding another provider")
            .await
        {
            Ok(request) => {
                self.timeouts
                    .schedule_redispatch(request_id, self.config.redispatch_delay);
                self.record_attempt(
                    request_id,
                    provider_id,
                    AttemptOutcome::Declined,
                    request.attempt_count,
                )
                .await;
                self.metrics
                    .provider_responses_total
                    .with_label_values(&["declined"])
                    .inc();
                info!(%request_id, %provider_id, reason, "provider declined");
                Ok(SignalOutcome::Applied)
            }
            Err(StoreError::PreconditionFailed(detail)) => {
                self.metrics
                    .provider_responses_total
                    .with_label_values(&["ignored"])
                    .inc();
                debug!(%request_id, %provider_id, %detail, "stale decline ignored");
                Ok(SignalOutcome::Ignored)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn on_timeout_expiry(
        &self,
        request_id: Uuid,
        attempt: u32,
    ) -> Result<SignalOutcome, DispatchError> {
        let Some(request) = self.store.get_request(request_id).await? else {
            return Ok(SignalOutcome::Ignored);
        };
        if request.status != RequestStatus::Dispatched || request.attempt_count != attempt {
            self.metrics
                .provider_responses_total
                .with_label_values(&["ignored"])
                .inc();
            debug!(%request_id, attempt, "stale timeout ignored");
            return Ok(SignalOutcome::Ignored);
        }
        let Some(provider_id) = request.assigned_provider else {
            return Ok(SignalOutcome::Ignored);
        };

        match self
            .store
            .release_assignment(request_id, provider_id, "finding another provider")
            .await
        {
            Ok(_) => {
                self.timeouts
                    .schedule_redispatch(request_id, self.config.redispatch_delay);
                self.record_attempt(request_id, provider_id, AttemptOutcome::TimedOut, attempt)
                    .await;
                self.metrics
                    .provider_responses_total
                    .with_label_values(&["timed_out"])
                    .inc();
                warn!(%request_id, %provider_id, attempt, "provider response timed out");
                Ok(SignalOutcome::Applied)
            }
            Err(StoreError::PreconditionFailed(_)) => {
                self.metrics
                    .provider_responses_total
                    .with_label_values(&["ignored"])
                    .inc();
                Ok(SignalOutcome::Ignored)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn on_provider_offline(
        &self,
        provider_id: Uuid,
    ) -> Result<SignalOutcome, DispatchError> {
        let Some(provider) = self.store.get_provider(provider_id).await? else {
            return Ok(SignalOutcome::Ignored);
        };
        let Some(request_id) = provider.assigned_request else {
            return Ok(SignalOutcome::Ignored);
        };

        self.on_provider_decline(request_id, provider_id, "provider went offline")
            .await
    }

    pub async fn cancel(
        &self,
        request_id: Uuid,
        reason: &str,
    ) -> Result<SignalOutcome, DispatchError> {
        let Some(request) = self.store.get_request(request_id).await? else {
            return Err(DispatchError::RequestNotFound(request_id));
        };
        if request.status.is_terminal() {
            return Ok(SignalOutcome::Ignored);
        }
        let was_in_flight = matches!(
            request.status,
            RequestStatus::Searching | RequestStatus::Dispatched
        );

        let termination = match self
            .store
            .terminate_request(request_id, RequestStatus::Cancelled, reason)
            .await
        {
            Ok(termination) => termination,
            Err(StoreError::PreconditionFailed(_)) => return Ok(SignalOutcome::Ignored),
            Err(err) => return Err(err.into()),
        };

        self.timeouts.cancel(request_id);
        if was_in_flight {
            self.metrics.requests_in_flight.dec();
        }
        if let Some(provider_id) = termination.released_provider {
            let notice = DispatchNotice::OfferWithdrawn {
                request_id,
                reason: reason.to_string(),
            };
            if let Err(err) = self.notifier.send(provider_id, &notice).await {
                warn!(%request_id, %provider_id, error = %err, "withdrawal notification failed");
            }
        }
        info!(%request_id, reason, "request cancelled");
        Ok(SignalOutcome::Applied)
    }

    pub async fn sweep_expired(&self, max_age_hours: i64) -> Result<usize, DispatchError> {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        let stale = self
            .store
            .stale_requests(cutoff, self.config.sweep_batch_limit)
            .await?;

        let mut swept = 0usize;
        for request in stale {
            let was_in_flight = matches!(
                request.status,
                RequestStatus::Searching | RequestStatus::Dispatched
            );
            let termination = match self
                .store
                .terminate_request(
                    request.id,
                    RequestStatus::Expired,
                    "request expired due to inactivity",
                )
                .await
            {
                Ok(termination) => termination,
                Err(StoreError::PreconditionFailed(_)) => continue,
                Err(err) => return Err(err.into()),
            };

            self.timeouts.cancel(request.id);
            if was_in_flight {
                self.metrics.requests_in_flight.dec();
            }
            if let Some(provider_id) = termination.released_provider {
                let notice = DispatchNotice::OfferWithdrawn {
                    request_id: request.id,
                    reason: "request expired".to_string(),
                };
                if let Err(err) = self.notifier.send(provider_id, &notice).await {
                    warn!(request_id = %request.id, %provider_id, error = %err, "withdrawal notification failed");
                }
            }
            swept += 1;
        }

        if swept > 0 {
            self.metrics.requests_swept_total.inc_by(swept as u64);
            info!(swept, max_age_hours, "expired stale requests");
        }
        Ok(swept)
    }

    pub async fn resume_inflight(&self) -> Result<usize, DispatchError> {
        let inflight = self.store.requests_in_flight().await?;
        let count = inflight.len();
        self.metrics.requests_in_flight.set(count as i64);

        for request in inflight {
            match request.status {
                RequestStatus::Searching => {
                    self.enqueue_dispatch(request.id).await?;
                }
                RequestStatus::Dispatched => {
                    let remaining = request
                        .response_deadline
                        .and_then(|deadline| (deadline - Utc::now()).to_std().ok())
                        .unwrap_or(Duration::ZERO);
                    self.timeouts
                        .arm_response_deadline(request.id, request.attempt_count, remaining);
                }
                _ => {}
            }
        }

        if count > 0 {
            info!(count, "resumed in-flight requests");
        }
        Ok(count)
    }

    pub async fn attempt_history(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<DispatchAttemptRecord>, DispatchError> {
        Ok(self.ledger.history(request_id).await?)
    }
}

fn validation_problem(request: &DispatchRequest) -> Option<String> {
    if !request.customer_location.is_valid() {
        return Some(format!(
            "invalid customer coordinates ({}, {})",
            request.customer_location.lat, request.customer_location.lng
        ));
    }
    if !catalog::is_known_class(request.service, &request.service_class) {
        return Some(format!(
            "unknown service class {}/{}",
            request.service, request.service_class
        ));
    }
    None
}

fn rank_candidates(
    request: &DispatchRequest,
    nearby: Vec<ProviderSnapshot>,
    limit: usize,
) -> Vec<(ProviderSnapshot, f64, ScoreBreakdown)> {
    let mut ranked: Vec<(ProviderSnapshot, f64, ScoreBreakdown)> = nearby
        .into_iter()
        .filter(|candidate| !request.attempted_providers.contains(&candidate.provider.id))
        .filter(|candidate| {
            eligibility::is_eligible(&candidate.provider, request.service, &request.service_class)
        })
        .map(|candidate| {
            let (score, breakdown) = compute_score(&candidate);
            (candidate, score, breakdown)
        })
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

pub async fn run_dispatch_engine(
    engine: Arc<DispatchEngine>,
    mut commands: mpsc::Receiver<EngineCommand>,
) {
    info!("dispatch engine started");

    while let Some(command) = commands.recv().await {
        engine.metrics.commands_in_queue.dec();

        match command {
            EngineCommand::Dispatch { request_id } => {
                let start = Instant::now();
                let label = match engine.dispatch(request_id).await {
                    Ok(outcome) => outcome.label(),
                    Err(err) => {
                        error!(%request_id, error = %err, "dispatch cycle failed");
                        "error"
                    }
                };
                let elapsed = start.elapsed().as_secs_f64();
                engine
                    .metrics
                    .dispatch_latency_seconds
                    .with_label_values(&[label])
                    .observe(elapsed);
                engine
                    .metrics
                    .dispatch_cycles_total
                    .with_label_values(&[label])
                    .inc();
            }
            EngineCommand::TimeoutExpired {
                request_id,
                attempt,
            } => {
                if let Err(err) = engine.on_timeout_expiry(request_id, attempt).await {
                    error!(%request_id, attempt, error = %err, "timeout expiry handling failed");
                }
            }
        }
    }

    warn!("dispatch engine stopped: command channel closed");
}
