/*!
 * Rule Engine
 *
 * Reacts to process lifecycle events by pinning matched processes to their
 * CCD group and everything else to the default CCD. Also re-asserts every
 * rule on demand and publishes filtered events for rule-matched processes.
 */

use super::registry::CcdRegistry;
use super::store::RuleStore;
use super::types::{
    ApplyAllReport, CoreGroup, DanglingRule, MonitoredProcessRule, RuleMap, RuleStatus,
};
use crate::affinity::AffinitySetter;
use crate::core::errors::{RuleError, RuleResult};
use crate::core::limits::{DEFAULT_ROW_NAME, NOT_SET};
use crate::core::sync::RcuCell;
use crate::core::types::SweepSummary;
use crate::monitoring::{
    span_operation, EventBus, ProcessEventKind, ProcessEventSource, ProcessEvents,
    ProcessSnapshotEntry, ProcessSubscription, RuleApplied,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Applies monitored process rules and the default CCD
///
/// Rule and group lookups read immutable snapshots, so event handling never
/// blocks on a concurrent rule edit and never sees a half-applied one.
pub struct RuleEngine {
    setter: AffinitySetter,
    registry: Arc<CcdRegistry>,
    store: Arc<dyn RuleStore>,
    rules: RcuCell<RuleMap>,
    auto_apply: AtomicBool,
    events: ProcessEvents,
    rule_applied: EventBus<RuleApplied>,
}

impl RuleEngine {
    /// Build an engine with rules loaded from `store`; auto-apply starts off
    pub fn new(
        setter: AffinitySetter,
        registry: Arc<CcdRegistry>,
        store: Arc<dyn RuleStore>,
    ) -> RuleResult<Arc<Self>> {
        let rules = store.load_rules()?;
        info!(rules = rules.len(), "monitored process rules loaded");

        let engine = Self {
            setter,
            registry,
            store,
            rules: RcuCell::new(rules),
            auto_apply: AtomicBool::new(false),
            events: ProcessEvents::new(),
            rule_applied: EventBus::new(),
        };
        for dangling in engine.dangling_rules() {
            warn!(
                process = %dangling.process_name,
                ccd = %dangling.ccd_name,
                "rule references a missing CCD group"
            );
        }
        Ok(Arc::new(engine))
    }

    /// Subscribe to a process event source
    ///
    /// The engine is held weakly by the subscription; dropping the last
    /// strong reference turns the listeners into no-ops.
    pub fn attach(self: &Arc<Self>, source: &dyn ProcessEventSource) -> ProcessSubscription {
        let engine = Arc::downgrade(self);
        source.events().subscribe_all(move |kind, entry| {
            if let Some(engine) = engine.upgrade() {
                engine.handle_event(kind, entry);
            }
        })
    }

    pub fn detach(&self, source: &dyn ProcessEventSource, subscription: ProcessSubscription) -> bool {
        source.events().unsubscribe_all(subscription)
    }

    /// Dispatch one process event
    pub fn handle_event(&self, kind: ProcessEventKind, entry: &ProcessSnapshotEntry) {
        match kind {
            ProcessEventKind::Started => {
                self.on_process_started(entry);
            }
            ProcessEventKind::Ended | ProcessEventKind::AffinityChanged => {
                if self.rules.load().contains_key(&entry.name) {
                    self.events.publish(kind, entry);
                }
            }
        }
    }

    /// React to a process start
    ///
    /// A matched rule pins the process to its group. Unmatched processes get
    /// the default CCD when one is configured. Nothing is written while
    /// auto-apply is off. Returns the write outcome, if a write was made.
    pub fn on_process_started(&self, entry: &ProcessSnapshotEntry) -> Option<RuleApplied> {
        let rules = self.rules.load();
        let auto_apply = self.auto_apply_enabled();

        if let Some(rule) = rules.get(&entry.name) {
            let outcome = if auto_apply {
                match self.registry.get(&rule.ccd_name) {
                    Some(group) => Some(self.apply_to_process(entry, &group)),
                    None => {
                        let err = RuleError::from(DanglingRule {
                            process_name: rule.process_name.clone(),
                            ccd_name: rule.ccd_name.clone(),
                        });
                        warn!(pid = entry.pid, error = %err, "skipping dangling rule");
                        None
                    }
                }
            } else {
                None
            };
            self.events.started.publish(entry);
            return outcome;
        }

        if !auto_apply {
            return None;
        }
        match self.registry.default_group() {
            Some(group) => Some(self.apply_to_process(entry, &group)),
            None => {
                debug!(pid = entry.pid, process = %entry.name, "no default CCD configured");
                None
            }
        }
    }

    fn apply_to_process(&self, entry: &ProcessSnapshotEntry, group: &CoreGroup) -> RuleApplied {
        let result = group
            .mask()
            .and_then(|mask| self.setter.set_by_pid(entry.pid, mask));

        let outcome = match result {
            Ok(message) => {
                info!(pid = entry.pid, process = %entry.name, ccd = %group.name, "rule applied");
                RuleApplied {
                    process_name: entry.name.clone(),
                    ccd_name: group.name.clone(),
                    pid: Some(entry.pid),
                    success: true,
                    message,
                }
            }
            Err(e) => {
                if e.is_not_found() {
                    debug!(pid = entry.pid, process = %entry.name, "process exited before rule applied");
                } else {
                    warn!(pid = entry.pid, process = %entry.name, ccd = %group.name, error = %e, "rule application failed");
                }
                RuleApplied {
                    process_name: entry.name.clone(),
                    ccd_name: group.name.clone(),
                    pid: Some(entry.pid),
                    success: false,
                    message: e.to_string(),
                }
            }
        };

        self.rule_applied.publish(&outcome);
        outcome
    }

    /// Re-assert every rule, then sweep the default CCD over everything else
    ///
    /// Runs regardless of auto-apply. Dangling rules are reported and
    /// skipped. Idempotent when the process table is stable.
    pub fn apply_all_rules_now(&self) -> RuleResult<ApplyAllReport> {
        let span = span_operation("apply_all_rules_now");
        let rules = self.rules.load();
        let mut report = ApplyAllReport::default();

        for rule in rules.values() {
            let Some(group) = self.registry.get(&rule.ccd_name) else {
                warn!(process = %rule.process_name, ccd = %rule.ccd_name, "skipping dangling rule");
                report.dangling.push(DanglingRule {
                    process_name: rule.process_name.clone(),
                    ccd_name: rule.ccd_name.clone(),
                });
                continue;
            };

            let result = group
                .mask()
                .and_then(|mask| self.setter.set_by_name(&rule.process_name, mask));
            let outcome = match result {
                Ok(applied) => RuleApplied {
                    process_name: rule.process_name.clone(),
                    ccd_name: group.name.clone(),
                    pid: None,
                    success: applied.is_success(),
                    message: applied.message(),
                },
                Err(e) => {
                    debug!(process = %rule.process_name, error = %e, "rule not applied");
                    RuleApplied {
                        process_name: rule.process_name.clone(),
                        ccd_name: group.name.clone(),
                        pid: None,
                        success: false,
                        message: e.to_string(),
                    }
                }
            };
            self.rule_applied.publish(&outcome);
            report.applied.push(outcome);
        }

        report.default_sweep = self.sweep_default(&rules)?;

        span.record_items_processed(report.applied.len());
        let sweep = report
            .default_sweep
            .map(|summary| summary.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(
            rules = report.applied.len(),
            dangling = report.dangling.len(),
            default_sweep = %sweep,
            "all rules applied"
        );
        Ok(report)
    }

    /// Sweep the default CCD over every process not covered by a rule
    ///
    /// Returns `None` when no usable default CCD is configured.
    pub fn apply_default_to_others(&self) -> RuleResult<Option<SweepSummary>> {
        let rules = self.rules.load();
        self.sweep_default(&rules)
    }

    fn sweep_default(&self, rules: &RuleMap) -> RuleResult<Option<SweepSummary>> {
        let Some(group) = self.registry.default_group() else {
            debug!("no default CCD configured, skipping sweep");
            return Ok(None);
        };
        let excluded: HashSet<String> = rules.keys().cloned().collect();
        let summary = self.setter.apply_to_all_except(group.mask()?, &excluded)?;
        info!(ccd = %group.name, %summary, "default CCD applied to other processes");
        Ok(Some(summary))
    }

    /// Insert or replace the rule for a process name
    ///
    /// The rule is persisted before it becomes visible; a save failure
    /// leaves the rule set unchanged. The group is not required to exist.
    pub fn add_rule(&self, rule: MonitoredProcessRule) -> RuleResult<()> {
        if rule.process_name.trim().is_empty() {
            return Err(RuleError::InvalidRule("process name cannot be empty".into()));
        }
        if rule.ccd_name.trim().is_empty() {
            return Err(RuleError::InvalidRule("CCD name cannot be empty".into()));
        }
        if !self.registry.contains(&rule.ccd_name) {
            warn!(process = %rule.process_name, ccd = %rule.ccd_name, "rule references a missing CCD group");
        }

        self.rules.try_update(|current| {
            let mut next = current.clone();
            next.insert(rule.process_name.clone(), rule.clone());
            self.store.save(&next)?;
            Ok::<_, RuleError>(next)
        })?;

        info!(process = %rule.process_name, ccd = %rule.ccd_name, "monitored process rule saved");
        Ok(())
    }

    /// Remove the rule for a process name; returns false if there was none
    pub fn remove_rule(&self, process_name: &str) -> RuleResult<bool> {
        let mut removed = false;
        self.rules.try_update(|current| {
            if !current.contains_key(process_name) {
                return Ok::<_, RuleError>(current.clone());
            }
            let mut next = current.clone();
            next.remove(process_name);
            self.store.save(&next)?;
            removed = true;
            Ok(next)
        })?;

        if removed {
            info!(process = %process_name, "monitored process rule removed");
        }
        Ok(removed)
    }

    /// Re-read rules and CCD groups from their stores
    pub fn reload(&self) -> RuleResult<()> {
        let rules = self.store.load_rules()?;
        self.registry.reload()?;
        self.rules.store(rules);
        info!(rules = self.rules.load().len(), "rules reloaded");
        Ok(())
    }

    pub fn set_auto_apply(&self, enabled: bool) {
        let previous = self.auto_apply.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(enabled, "auto-apply toggled");
        }
    }

    pub fn auto_apply_enabled(&self) -> bool {
        self.auto_apply.load(Ordering::Acquire)
    }

    /// Immutable view of the current rules
    pub fn rules(&self) -> Arc<RuleMap> {
        self.rules.load()
    }

    pub fn rule(&self, process_name: &str) -> Option<MonitoredProcessRule> {
        self.rules.load().get(process_name).cloned()
    }

    /// Rules whose CCD group does not exist
    pub fn dangling_rules(&self) -> Vec<DanglingRule> {
        let config = self.registry.snapshot();
        self.rules
            .load()
            .values()
            .filter(|rule| !config.groups.contains_key(&rule.ccd_name))
            .map(|rule| DanglingRule {
                process_name: rule.process_name.clone(),
                ccd_name: rule.ccd_name.clone(),
            })
            .collect()
    }

    /// One row per rule plus a trailing row for the default CCD
    pub fn status(&self) -> Vec<RuleStatus> {
        let config = self.registry.snapshot();
        let rules = self.rules.load();
        let mut rows = Vec::with_capacity(rules.len() + 1);

        for rule in rules.values() {
            let affinity = if config.groups.contains_key(&rule.ccd_name) {
                self.setter.describe_name(&rule.process_name)
            } else {
                NOT_SET.to_string()
            };
            rows.push(RuleStatus {
                process_name: rule.process_name.clone(),
                display_name: rule.process_name.clone(),
                ccd_name: rule.ccd_name.clone(),
                affinity,
                is_default: false,
            });
        }

        rows.push(RuleStatus {
            process_name: String::new(),
            display_name: DEFAULT_ROW_NAME.to_string(),
            ccd_name: config
                .default_ccd
                .clone()
                .unwrap_or_else(|| NOT_SET.to_string()),
            affinity: config
                .default_group()
                .map(CoreGroup::describe)
                .unwrap_or_else(|| NOT_SET.to_string()),
            is_default: true,
        });
        rows
    }

    /// Events for rule-matched processes only
    pub fn events(&self) -> &ProcessEvents {
        &self.events
    }

    /// Outcome of every affinity write the engine makes
    pub fn rule_applied(&self) -> &EventBus<RuleApplied> {
        &self.rule_applied
    }

    pub fn registry(&self) -> &Arc<CcdRegistry> {
        &self.registry
    }

    pub fn setter(&self) -> &AffinitySetter {
        &self.setter
    }
}

impl ProcessEventSource for RuleEngine {
    fn events(&self) -> &ProcessEvents {
        &self.events
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.load().len())
            .field("auto_apply", &self.auto_apply_enabled())
            .finish_non_exhaustive()
    }
}
