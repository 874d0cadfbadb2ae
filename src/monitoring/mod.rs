/*!
 * Process Monitoring
 * Snapshot sampling, lifecycle events, and structured tracing
 */

pub mod events;
pub mod sampler;
pub mod snapshot;
mod tracer;

pub use events::{
    EventBus, ProcessEventKind, ProcessEventSource, ProcessEvents, ProcessSubscription,
    RuleApplied, SubscriptionId,
};
pub use sampler::{ProcessSampler, SamplerState};
pub use snapshot::{ProcessSnapshot, ProcessSnapshotEntry, SnapshotDiff};
pub use tracer::{generate_trace_id, init_tracing, span_operation, OperationSpan};
