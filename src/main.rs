mod catalog;
mod config;
mod engine;
mod error;
mod geo;
mod models;
mod notify;
mod observability;
mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::engine::{DispatchEngine, run_dispatch_engine};
use crate::geo::GeoPoint;
use crate::geo::index::InMemoryGeoIndex;
use crate::models::provider::Provider;
use crate::models::request::{DispatchRequest, Priority, RequestStatus, ServiceKind};
use crate::notify::LogNotifier;
use crate::store::{DispatchStore, InMemoryStore};

#[tokio::main]
async fn main() -> Result<(), error::DispatchError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let mut dispatch_config = config.dispatch.clone();
    dispatch_config.retry_delay = Duration::from_millis(300);
    dispatch_config.redispatch_delay = Duration::from_millis(150);
    dispatch_config.response_timeout = Duration::from_millis(800);
    dispatch_config.moving_response_timeout = Duration::from_millis(800);

    let store = Arc::new(InMemoryStore::new());
    let geo = Arc::new(InMemoryGeoIndex::new(Arc::clone(&store)));
    let (dispatch, command_rx) = DispatchEngine::new(
        store.clone(),
        geo,
        Arc::new(LogNotifier),
        dispatch_config,
    );
    tokio::spawn(run_dispatch_engine(dispatch.clone(), command_rx));

    seed_fleet(&store).await?;

    let rides: Vec<DispatchRequest> = (0..3)
        .map(|i| {
            DispatchRequest::new(
                ServiceKind::Transport,
                "standard",
                GeoPoint::new(6.5244 + f64::from(i) * 0.002, 3.3792),
            )
        })
        .collect();
    let submissions = join_all(rides.into_iter().map(|request| {
        let dispatch = dispatch.clone();
        async move { dispatch.submit(request).await }
    }))
    .await;
    let ride_ids: Vec<Uuid> = submissions.into_iter().collect::<Result<_, _>>()?;
    for request_id in &ride_ids {
        accept_current_offer(&dispatch, &store, *request_id).await?;
    }

    let declined_ride = dispatch
        .submit(DispatchRequest::new(
            ServiceKind::Transport,
            "standard",
            GeoPoint::new(6.5244, 3.3792),
        ))
        .await?;
    if let Some(offer) = wait_for(&store, declined_ride, |r| {
        r.status == RequestStatus::Dispatched
    })
    .await?
    {
        if let Some(first_provider) = offer.assigned_provider {
            dispatch
                .on_provider_decline(declined_ride, first_provider, "already en route elsewhere")
                .await?;
            if let Some(reoffer) = wait_for(&store, declined_ride, |r| {
                r.status == RequestStatus::Dispatched && r.assigned_provider != Some(first_provider)
            })
            .await?
            {
                if let Some(second_provider) = reoffer.assigned_provider {
                    dispatch
                        .on_provider_accept(declined_ride, second_provider)
                        .await?;
                }
            }
        }
    }

    let timed_out_ride = dispatch
        .submit(DispatchRequest::new(
            ServiceKind::Transport,
            "standard",
            GeoPoint::new(6.5260, 3.3800),
        ))
        .await?;
    if let Some(offer) = wait_for(&store, timed_out_ride, |r| {
        r.status == RequestStatus::Dispatched
    })
    .await?
    {
        let silent_provider = offer.assigned_provider;
        if let Some(reoffer) = wait_for(&store, timed_out_ride, |r| {
            r.status == RequestStatus::Dispatched && r.assigned_provider != silent_provider
        })
        .await?
        {
            if let Some(provider_id) = reoffer.assigned_provider {
                dispatch
                    .on_provider_accept(timed_out_ride, provider_id)
                    .await?;
            }
        }
    }

    let emergency_call = dispatch
        .submit(
            DispatchRequest::new(
                ServiceKind::Emergency,
                "ambulance",
                GeoPoint::new(6.5248, 3.3798),
            )
            .with_priority(Priority::Critical),
        )
        .await?;
    accept_current_offer(&dispatch, &store, emergency_call).await?;

    let moving_job = dispatch
        .submit(DispatchRequest::new(
            ServiceKind::Moving,
            "truck_small",
            GeoPoint::new(6.5250, 3.3802),
        ))
        .await?;
    accept_current_offer(&dispatch, &store, moving_job).await?;

    let bus_trip = dispatch
        .submit(DispatchRequest::new(
            ServiceKind::Transport,
            "bus_mini",
            GeoPoint::new(6.5244, 3.3792),
        ))
        .await?;
    accept_current_offer(&dispatch, &store, bus_trip).await?;

    let hire_job = dispatch
        .submit(DispatchRequest::new(
            ServiceKind::Hire,
            "plumber",
            GeoPoint::new(6.5244, 3.3792),
        ))
        .await?;
    tokio::time::sleep(Duration::from_millis(700)).await;
    dispatch.cancel(hire_job, "cancelled by customer").await?;

    let mut stale = DispatchRequest::new(
        ServiceKind::Moving,
        "truck_small",
        GeoPoint::new(6.5244, 3.3792),
    );
    stale.status = RequestStatus::Searching;
    stale.created_at = Utc::now() - chrono::Duration::hours(30);
    store.put_request(&stale).await?;
    let swept = dispatch
        .sweep_expired(config.dispatch.sweep_max_age_hours)
        .await?;
    tracing::info!(swept, "sweep finished");

    print_summary(&dispatch, &store, timed_out_ride).await?;
    Ok(())
}

async fn seed_fleet(store: &Arc<InMemoryStore>) -> Result<(), error::DispatchError> {
    let mut fleet = Vec::new();

    let ratings = [4.9, 4.7, 4.5, 4.3, 4.1, 3.9];
    for (i, rating) in ratings.into_iter().enumerate() {
        let mut taxi = Provider::new(
            format!("taxi-{i}"),
            ServiceKind::Transport,
            GeoPoint::new(6.5244 + i as f64 * 0.003, 3.3792 + i as f64 * 0.002),
        );
        taxi.subcategory = Some("Taxi".to_string());
        taxi.rating = Some(rating);
        taxi.completed_orders = 40 * (i as u32 + 1);
        taxi.avg_response_secs = Some(12.0 + i as f64 * 4.0);
        taxi.completion_rate = Some(0.85 + i as f64 * 0.02);
        fleet.push(taxi);
    }

    let mut small_bus = Provider::new(
        "bus-small",
        ServiceKind::Transport,
        GeoPoint::new(6.5246, 3.3794),
    );
    small_bus.subcategory = Some("Bus".to_string());
    small_bus.vehicle_capacity = 6;
    fleet.push(small_bus);

    let mut mini_bus = Provider::new(
        "bus-mini",
        ServiceKind::Transport,
        GeoPoint::new(6.5300, 3.3850),
    );
    mini_bus.subcategory = Some("Bus".to_string());
    mini_bus.vehicle_capacity = 10;
    fleet.push(mini_bus);

    let mut medic = Provider::new(
        "medic-1",
        ServiceKind::Emergency,
        GeoPoint::new(6.5250, 3.3800),
    );
    medic.enabled_classes.insert("ambulance".to_string(), true);
    medic.certifications = vec!["first_aid".to_string()];
    fleet.push(medic);

    let mut mover = Provider::new(
        "mover-1",
        ServiceKind::Moving,
        GeoPoint::new(6.5250, 3.3800),
    );
    mover.vehicle_type = Some("truck".to_string());
    fleet.push(mover);

    let count = fleet.len();
    for provider in &fleet {
        store.put_provider(provider).await?;
    }
    tracing::info!(count, "fleet seeded");
    Ok(())
}

async fn accept_current_offer(
    dispatch: &Arc<DispatchEngine>,
    store: &Arc<InMemoryStore>,
    request_id: Uuid,
) -> Result<(), error::DispatchError> {
    let Some(offer) = wait_for(store, request_id, |r| {
        r.status == RequestStatus::Dispatched
    })
    .await?
    else {
        tracing::error!(%request_id, "request was never dispatched");
        return Ok(());
    };
    if let Some(provider_id) = offer.assigned_provider {
        dispatch.on_provider_accept(request_id, provider_id).await?;
    }
    Ok(())
}

async fn wait_for(
    store: &Arc<InMemoryStore>,
    request_id: Uuid,
    predicate: impl Fn(&DispatchRequest) -> bool,
) -> Result<Option<DispatchRequest>, error::DispatchError> {
    for _ in 0..200 {
        if let Some(request) = store.get_request(request_id).await? {
            if predicate(&request) {
                return Ok(Some(request));
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    Ok(None)
}

async fn print_summary(
    dispatch: &Arc<DispatchEngine>,
    store: &Arc<InMemoryStore>,
    request_id: Uuid,
) -> Result<(), error::DispatchError> {
    println!("\n--- attempt trail for {request_id} ---");
    for record in dispatch.attempt_history(request_id).await? {
        println!(
            "attempt {} provider {} -> {:?}",
            record.attempt, record.provider_id, record.outcome
        );
    }

    println!("\n--- final request states ---");
    let mut requests = store.requests_snapshot()?;
    requests.sort_by_key(|r| r.created_at);
    for request in requests {
        println!(
            "{} {}/{} {:?} ({})",
            request.id,
            request.service,
            request.service_class,
            request.status,
            request.status_message.as_deref().unwrap_or("-")
        );
    }

    println!("\n--- metrics ---");
    match dispatch.metrics().encode() {
        Ok(text) => println!("{text}"),
        Err(err) => tracing::error!(error = %err, "metrics encode failed"),
    }
    Ok(())
}
