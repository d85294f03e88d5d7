use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::observability::Metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Dispatch { request_id: Uuid },
    TimeoutExpired { request_id: Uuid, attempt: u32 },
}

pub async fn enqueue(
    tx: &mpsc::Sender<EngineCommand>,
    metrics: &Metrics,
    command: EngineCommand,
) -> Result<(), DispatchError> {
    tx.send(command)
        .await
        .map_err(|err| DispatchError::QueueClosed(format!("engine command send failed: {err}")))?;

    metrics.commands_in_queue.inc();
    Ok(())
}
