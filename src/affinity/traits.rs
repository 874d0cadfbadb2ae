/*!
 * Affinity Traits
 * OS process facility abstraction
 */

use super::mask::AffinityMask;
use crate::core::errors::AffinityResult;
use crate::core::types::Pid;
use serde::{Deserialize, Serialize};

/// A live process as reported by the OS facility
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: Pid,
    pub name: String,
}

impl ProcessRecord {
    pub fn new(pid: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.pid)
    }
}

/// Process table and scheduler affinity access
///
/// Every call may fail with `ProcessNotFound` or `PermissionDenied` at any
/// time because processes start and exit concurrently with the caller.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessTable: Send + Sync {
    /// Enumerate live processes
    fn processes(&self) -> AffinityResult<Vec<ProcessRecord>>;

    /// Name of a live process
    fn process_name(&self, pid: Pid) -> AffinityResult<String>;

    /// Current affinity of a live process
    fn affinity(&self, pid: Pid) -> AffinityResult<AffinityMask>;

    /// Replace the affinity of a live process
    fn set_affinity(&self, pid: Pid, mask: AffinityMask) -> AffinityResult<()>;

    /// Logical processor count of the machine
    fn processor_count(&self) -> usize;
}
