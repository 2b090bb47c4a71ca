pub mod bootstrap;
pub mod dispatcher;
pub mod history;
pub mod metrics;
pub mod router;

pub use bootstrap::{Runtime, build_runtime};
pub use dispatcher::{AbortReason, DispatchSettings, PipelineOutcome, TriggerDispatcher};
pub use history::{HistoryBuffer, HistoryEntry};
pub use metrics::Metrics;
pub use router::{build_router, serve_metrics};
