use std::env;
use std::time::Duration;

use crate::error::DispatchError;
use crate::models::request::{Priority, ServiceKind};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_attempts: u32,
    pub base_radius_km: f64,
    pub emergency_base_radius_km: f64,
    pub moving_base_radius_km: f64,
    pub radius_step_km: f64,
    pub max_radius_km: f64,
    pub candidate_limit: usize,
    pub offer_limit: usize,
    pub retry_delay: Duration,
    pub redispatch_delay: Duration,
    pub response_timeout: Duration,
    pub moving_response_timeout: Duration,
    pub sweep_max_age_hours: i64,
    pub sweep_batch_limit: usize,
    pub command_queue_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_radius_km: 5.0,
            emergency_base_radius_km: 10.0,
            moving_base_radius_km: 10.0,
            radius_step_km: 2.0,
            max_radius_km: 25.0,
            candidate_limit: 50,
            offer_limit: 10,
            retry_delay: Duration::from_secs(10),
            redispatch_delay: Duration::from_secs(2),
            response_timeout: Duration::from_secs(60),
            moving_response_timeout: Duration::from_secs(90),
            sweep_max_age_hours: 24,
            sweep_batch_limit: 100,
            command_queue_size: 1024,
        }
    }
}

impl DispatchConfig {
    pub fn base_radius_for(&self, service: ServiceKind) -> f64 {
        match service {
            ServiceKind::Transport | ServiceKind::Hire => self.base_radius_km,
            ServiceKind::Emergency => self.emergency_base_radius_km,
            ServiceKind::Moving => self.moving_base_radius_km,
        }
    }

    pub fn search_radius_km(&self, service: ServiceKind, attempt: u32) -> f64 {
        let expanded = self.base_radius_for(service) + self.radius_step_km * attempt as f64;
        expanded.min(self.max_radius_km)
    }

    pub fn response_timeout_for(&self, service: ServiceKind, priority: Priority) -> Duration {
        match service {
            ServiceKind::Moving => self.moving_response_timeout,
            ServiceKind::Emergency => match priority {
                Priority::Critical => Duration::from_secs(30),
                Priority::High => Duration::from_secs(45),
                Priority::Medium => Duration::from_secs(60),
                Priority::Low => Duration::from_secs(90),
            },
            ServiceKind::Transport | ServiceKind::Hire => self.response_timeout,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, DispatchError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            dispatch: DispatchConfig {
                max_attempts: parse_or_default("DISPATCH_MAX_ATTEMPTS", 5)?,
                base_radius_km: parse_or_default("DISPATCH_BASE_RADIUS_KM", 5.0)?,
                emergency_base_radius_km: parse_or_default(
                    "DISPATCH_EMERGENCY_BASE_RADIUS_KM",
                    10.0,
                )?,
                moving_base_radius_km: parse_or_default("DISPATCH_MOVING_BASE_RADIUS_KM", 10.0)?,
                radius_step_km: parse_or_default("DISPATCH_RADIUS_STEP_KM", 2.0)?,
                max_radius_km: parse_or_default("DISPATCH_MAX_RADIUS_KM", 25.0)?,
                candidate_limit: parse_or_default("DISPATCH_CANDIDATE_LIMIT", 50)?,
                offer_limit: parse_or_default("DISPATCH_OFFER_LIMIT", 10)?,
                retry_delay: Duration::from_millis(parse_or_default(
                    "DISPATCH_RETRY_DELAY_MS",
                    10_000,
                )?),
                redispatch_delay: Duration::from_millis(parse_or_default(
                    "DISPATCH_REDISPATCH_DELAY_MS",
                    2_000,
                )?),
                response_timeout: Duration::from_millis(parse_or_default(
                    "DISPATCH_RESPONSE_TIMEOUT_MS",
                    60_000,
                )?),
                moving_response_timeout: Duration::from_millis(parse_or_default(
                    "DISPATCH_MOVING_RESPONSE_TIMEOUT_MS",
                    90_000,
                )?),
                sweep_max_age_hours: parse_or_default("DISPATCH_SWEEP_MAX_AGE_HOURS", 24)?,
                sweep_batch_limit: parse_or_default("DISPATCH_SWEEP_BATCH_LIMIT", 100)?,
                command_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", 1024)?,
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, DispatchError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| DispatchError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
