use crate::geo::index::ProviderSnapshot;
use crate::models::provider::Provider;

const DISTANCE_WEIGHT: f64 = 0.35;
const RATING_WEIGHT: f64 = 0.25;
const EXPERIENCE_WEIGHT: f64 = 0.20;
const SPEED_WEIGHT: f64 = 0.10;
const RELIABILITY_WEIGHT: f64 = 0.10;

const DEFAULT_RATING: f64 = 4.0;
const DEFAULT_RESPONSE_SECS: f64 = 30.0;
const DEFAULT_COMPLETION_RATE: f64 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub rating_score: f64,
    pub experience_score: f64,
    pub speed_score: f64,
    pub reliability_score: f64,
}

pub fn compute_score(candidate: &ProviderSnapshot) -> (f64, ScoreBreakdown) {
    let provider = &candidate.provider;

    let breakdown = ScoreBreakdown {
        distance_score: distance_score(candidate.distance_km),
        rating_score: rating_score(provider),
        experience_score: experience_score(provider),
        speed_score: speed_score(provider),
        reliability_score: reliability_score(provider),
    };

    let score = weighted_score(&breakdown);
    (score, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    let total = (breakdown.distance_score * DISTANCE_WEIGHT)
        + (breakdown.rating_score * RATING_WEIGHT)
        + (breakdown.experience_score * EXPERIENCE_WEIGHT)
        + (breakdown.speed_score * SPEED_WEIGHT)
        + (breakdown.reliability_score * RELIABILITY_WEIGHT);
    round2(total)
}

fn distance_score(distance_km: f64) -> f64 {
    (100.0 - distance_km * 15.0).max(0.0)
}

fn rating_score(provider: &Provider) -> f64 {
    let rating = provider.rating.unwrap_or(DEFAULT_RATING);
    (rating / 5.0) * 100.0
}

fn experience_score(provider: &Provider) -> f64 {
    (f64::from(provider.completed_orders) * 0.5).min(50.0)
}

fn speed_score(provider: &Provider) -> f64 {
    let response_secs = provider.avg_response_secs.unwrap_or(DEFAULT_RESPONSE_SECS);
    (50.0 - response_secs).max(0.0)
}

fn reliability_score(provider: &Provider) -> f64 {
    let rate = provider.completion_rate.unwrap_or(DEFAULT_COMPLETION_RATE);
    rate * 50.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
