/*!
 * CCD Affinity Library
 *
 * Watches the process table and pins processes to named CPU core groups
 * (CCDs) according to persisted rules, with a default group for everything
 * else.
 */

pub mod affinity;
pub mod config;
pub mod core;
pub mod monitoring;
pub mod rules;

// Re-exports
pub use affinity::{
    format_core_list, system_process_table, AffinityMask, AffinitySetter, ApplyReport,
    ProcessRecord, ProcessTable,
};
pub use config::DaemonConfig;
pub use crate::core::{
    AffinityError, AffinityResult, ConfigError, CoreId, DaemonError, DaemonResult,
    DebounceOutcome, Debouncer, Pid, RuleError, RuleResult, StoreError, StoreResult,
    SweepSummary,
};
pub use monitoring::{
    init_tracing, span_operation, EventBus, ProcessEventKind, ProcessEventSource,
    ProcessEvents, ProcessSampler, ProcessSnapshot, ProcessSnapshotEntry,
    ProcessSubscription, RuleApplied, SamplerState, SnapshotDiff, SubscriptionId,
};
pub use rules::{
    ApplyAllReport, CcdConfig, CcdRegistry, ConfigStore, CoreGroup, DanglingRule,
    JsonRuleStore, MemoryConfigStore, MemoryRuleStore, MonitoredProcessRule, RuleEngine,
    RuleStatus, RuleStore, TomlConfigStore,
};
