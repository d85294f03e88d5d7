pub mod eligibility;
pub mod ledger;
pub mod orchestrator;
pub mod queue;
pub mod scoring;
pub mod timeout;

pub use orchestrator::{DispatchEngine, DispatchOutcome, SignalOutcome, run_dispatch_engine};
pub use queue::EngineCommand;
