use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_cycles_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub requests_in_flight: IntGauge,
    pub provider_responses_total: IntCounterVec,
    pub commit_conflicts_total: IntCounter,
    pub requests_swept_total: IntCounter,
    pub commands_in_queue: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_cycles_total = IntCounterVec::new(
            Opts::new("dispatch_cycles_total", "Dispatch cycles by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_cycles_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of a dispatch cycle in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let requests_in_flight =
            IntGauge::new("requests_in_flight", "Requests currently searching or dispatched")
                .expect("valid requests_in_flight metric");

        let provider_responses_total = IntCounterVec::new(
            Opts::new("provider_responses_total", "Provider responses by kind"),
            &["response"],
        )
        .expect("valid provider_responses_total metric");

        let commit_conflicts_total = IntCounter::new(
            "commit_conflicts_total",
            "Assignments lost to a concurrent state change",
        )
        .expect("valid commit_conflicts_total metric");

        let requests_swept_total =
            IntCounter::new("requests_swept_total", "Requests expired by the sweep")
                .expect("valid requests_swept_total metric");

        let commands_in_queue =
            IntGauge::new("commands_in_queue", "Engine commands waiting in the queue")
                .expect("valid commands_in_queue metric");

        registry
            .register(Box::new(dispatch_cycles_total.clone()))
            .expect("register dispatch_cycles_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(requests_in_flight.clone()))
            .expect("register requests_in_flight");
        registry
            .register(Box::new(provider_responses_total.clone()))
            .expect("register provider_responses_total");
        registry
            .register(Box::new(commit_conflicts_total.clone()))
            .expect("register commit_conflicts_total");
        registry
            .register(Box::new(requests_swept_total.clone()))
            .expect("register requests_swept_total");
        registry
            .register(Box::new(commands_in_queue.clone()))
            .expect("register commands_in_queue");

        Self {
            registry,
            dispatch_cycles_total,
            dispatch_latency_seconds,
            requests_in_flight,
            provider_responses_total,
            commit_conflicts_total,
            requests_swept_total,
            commands_in_queue,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
