use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::engine::queue::{self, EngineCommand};
use crate::observability::Metrics;

type TimerSlot = Arc<DashMap<Uuid, JoinHandle<()>>>;

pub struct TimeoutScheduler {
    deadlines: TimerSlot,
    wakeups: TimerSlot,
    commands: mpsc::Sender<EngineCommand>,
    metrics: Metrics,
}

impl TimeoutScheduler {
    pub fn new(commands: mpsc::Sender<EngineCommand>, metrics: Metrics) -> Arc<Self> {
        Arc::new(Self {
            deadlines: Arc::new(DashMap::new()),
            wakeups: Arc::new(DashMap::new()),
            commands,
            metrics,
        })
    }

    pub fn arm_response_deadline(&self, request_id: Uuid, attempt: u32, after: Duration) {
        let command = EngineCommand::TimeoutExpired {
            request_id,
            attempt,
        };
        self.arm(&self.deadlines, request_id, after, command);
    }

    pub fn schedule_redispatch(&self, request_id: Uuid, delay: Duration) {
        self.arm(
            &self.wakeups,
            request_id,
            delay,
            EngineCommand::Dispatch { request_id },
        );
    }

    fn arm(&self, slot: &TimerSlot, request_id: Uuid, after: Duration, command: EngineCommand) {
        let tx = self.commands.clone();
        let metrics = self.metrics.clone();
        let entries = Arc::clone(slot);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(err) = queue::enqueue(&tx, &metrics, command).await {
                tracing::debug!(%request_id, %err, "timer fired after engine shutdown");
            }
            let own_id = tokio::task::id();
            entries.remove_if(&request_id, |_, held| held.id() == own_id);
        });

        if let Some(previous) = slot.insert(request_id, handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self, request_id: Uuid) {
        for slot in [&self.deadlines, &self.wakeups] {
            if let Some((_, handle)) = slot.remove(&request_id) {
                handle.abort();
            }
        }
    }
}
