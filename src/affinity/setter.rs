/*!
 * Affinity Setter
 * Side-effecting affinity reads and writes by pid, by name, and in bulk
 */

use super::mask::AffinityMask;
use super::traits::{ProcessRecord, ProcessTable};
use crate::core::errors::{AffinityError, AffinityResult};
use crate::core::types::{Pid, SweepSummary};
use crate::monitoring::span_operation;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of writing one mask to every instance of a process name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub process_name: String,
    pub mask: AffinityMask,
    pub succeeded: Vec<Pid>,
    pub failures: Vec<(Pid, AffinityError)>,
}

impl ApplyReport {
    /// Full success only when every instance accepted the write
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn message(&self) -> String {
        if self.is_success() {
            return format!(
                "Successfully set CPU affinity for {} processes",
                self.succeeded.len()
            );
        }

        let mut message = format!(
            "Some processes failed to set. Success: {}, Failed: {}",
            self.succeeded.len(),
            self.failures.len()
        );
        for (_, err) in &self.failures {
            message.push('\n');
            message.push_str(&err.to_string());
        }
        message
    }
}

/// Attach the process identity to an error raised by the facility
fn attribute(err: AffinityError, name: &str, pid: Pid) -> AffinityError {
    match err {
        AffinityError::ProcessNotFound(_) => {
            AffinityError::ProcessNotFound(format!("{}({})", name, pid))
        }
        AffinityError::PermissionDenied(_) => {
            AffinityError::PermissionDenied(format!("{}({})", name, pid))
        }
        AffinityError::Os(reason) => AffinityError::Os(format!("{}({}): {}", name, pid, reason)),
        other => other,
    }
}

/// Thin wrapper over a [`ProcessTable`] with affinity semantics
#[derive(Clone)]
pub struct AffinitySetter {
    table: Arc<dyn ProcessTable>,
}

impl AffinitySetter {
    pub fn new(table: Arc<dyn ProcessTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<dyn ProcessTable> {
        &self.table
    }

    /// Write `mask` to one process
    ///
    /// `ProcessNotFound` is the expected outcome when the process exited
    /// after it was observed.
    pub fn set_by_pid(&self, pid: Pid, mask: AffinityMask) -> AffinityResult<String> {
        debug!(pid, cores = %mask, "setting affinity by pid");

        let name = self.table.process_name(pid).map_err(|e| {
            debug!(pid, error = %e, "affinity target vanished");
            e
        })?;
        self.write(pid, &name, mask)
    }

    fn write(&self, pid: Pid, name: &str, mask: AffinityMask) -> AffinityResult<String> {
        match self.table.set_affinity(pid, mask) {
            Ok(()) => {
                debug!(pid, process = %name, cores = %mask, "affinity set");
                Ok(format!(
                    "Set CPU affinity of {}({}) to {}",
                    name, pid, mask
                ))
            }
            Err(e) => {
                let err = attribute(e, name, pid);
                debug!(pid, process = %name, error = %err, "affinity write failed");
                Err(err)
            }
        }
    }

    /// Pids of every live process called `name`
    pub fn pids_named(&self, name: &str) -> AffinityResult<Vec<Pid>> {
        let mut pids: Vec<Pid> = self
            .table
            .processes()?
            .into_iter()
            .filter(|record| record.name == name)
            .map(|record| record.pid)
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    /// Write `mask` to every live instance of `name`
    ///
    /// Instances are written independently. Failures are reported per
    /// instance and never roll back instances that succeeded.
    pub fn set_by_name(&self, name: &str, mask: AffinityMask) -> AffinityResult<ApplyReport> {
        let pids = self.pids_named(name)?;
        if pids.is_empty() {
            debug!(process = %name, "no running instances");
            return Err(AffinityError::ProcessNotFound(name.to_string()));
        }

        let mut report = ApplyReport {
            process_name: name.to_string(),
            mask,
            succeeded: Vec::with_capacity(pids.len()),
            failures: Vec::new(),
        };

        for pid in pids {
            match self.write(pid, name, mask) {
                Ok(_) => report.succeeded.push(pid),
                Err(e) => report.failures.push((pid, e)),
            }
        }

        if report.is_success() {
            info!(
                process = %name,
                cores = %mask,
                instances = report.succeeded.len(),
                "affinity applied by name"
            );
        } else {
            warn!(
                process = %name,
                succeeded = report.succeeded.len(),
                failed = report.failures.len(),
                "affinity partially applied by name"
            );
        }

        Ok(report)
    }

    /// Current affinity and name of a live process
    pub fn get_affinity(&self, pid: Pid) -> AffinityResult<(AffinityMask, String)> {
        let name = self.table.process_name(pid)?;
        let mask = self
            .table
            .affinity(pid)
            .map_err(|e| attribute(e, &name, pid))?;
        Ok((mask, name))
    }

    /// Running processes ordered by name, then pid
    pub fn list_running(&self) -> AffinityResult<Vec<ProcessRecord>> {
        let mut records: Vec<ProcessRecord> = self
            .table
            .processes()?
            .into_iter()
            .filter(|record| !record.name.is_empty())
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name).then(a.pid.cmp(&b.pid)));
        Ok(records)
    }

    /// Write `mask` to every running process whose name is not excluded
    ///
    /// Exited and protected processes are counted as failures and the sweep
    /// continues.
    pub fn apply_to_all_except(
        &self,
        mask: AffinityMask,
        excluded: &HashSet<String>,
    ) -> AffinityResult<SweepSummary> {
        let span = span_operation("apply_to_all_except");
        let mut summary = SweepSummary::default();

        for record in self.list_running()? {
            if excluded.contains(&record.name) {
                continue;
            }
            summary.record(self.write(record.pid, &record.name, mask).is_ok());
        }

        span.record_items_processed(summary.total());
        debug!(%summary, cores = %mask, "sweep complete");
        Ok(summary)
    }

    /// Restore every running process to all logical processors
    pub fn restore_all(&self) -> AffinityResult<SweepSummary> {
        let mask = AffinityMask::full(self.table.processor_count())?;
        let summary = self.apply_to_all_except(mask, &HashSet::new())?;
        info!(%summary, cores = %mask, "restore completed");
        Ok(summary)
    }

    /// Live affinity of a pid as a range string
    pub fn describe_pid(&self, pid: Pid) -> String {
        match self.get_affinity(pid) {
            Ok((mask, _)) => mask.to_human_readable(),
            Err(e) => {
                debug!(pid, error = %e, "cannot describe affinity");
                "Failed to get".to_string()
            }
        }
    }

    /// Live affinity of every instance of `name` as a range string
    pub fn describe_name(&self, name: &str) -> String {
        let pids = match self.pids_named(name) {
            Ok(pids) => pids,
            Err(e) => {
                warn!(process = %name, error = %e, "cannot enumerate processes");
                return "Failed to get".to_string();
            }
        };
        if pids.is_empty() {
            return crate::core::limits::PROCESS_NOT_RUNNING.to_string();
        }

        let masks: BTreeSet<AffinityMask> = pids
            .iter()
            .filter_map(|&pid| self.table.affinity(pid).ok())
            .collect();

        match masks.len() {
            0 => "Failed to get".to_string(),
            1 => masks
                .into_iter()
                .next()
                .map(AffinityMask::to_human_readable)
                .unwrap_or_default(),
            _ => format!(
                "Multiple processes ({}) with inconsistent affinity",
                pids.len()
            ),
        }
    }
}

impl std::fmt::Debug for AffinitySetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinitySetter").finish_non_exhaustive()
    }
}
