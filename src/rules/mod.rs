/*!
 * Rules Module
 * CCD groups, monitored process rules, persistence, and the rule engine
 */

pub mod engine;
pub mod registry;
pub mod store;
pub mod types;

pub use engine::RuleEngine;
pub use registry::CcdRegistry;
pub use store::{
    ConfigStore, JsonRuleStore, MemoryConfigStore, MemoryRuleStore, RuleStore, TomlConfigStore,
};
pub use types::{
    ApplyAllReport, CcdConfig, CoreGroup, CoreGroupMap, DanglingRule, MonitoredProcessRule,
    RuleMap, RuleStatus,
};
