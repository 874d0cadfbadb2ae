/*!
 * Process Snapshots
 * Point-in-time process table captures and the start/end/affinity diff
 */

use crate::affinity::{AffinityMask, ProcessTable};
use crate::core::errors::AffinityResult;
use crate::core::types::Pid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// One process as observed in a single sampling pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessSnapshotEntry {
    pub pid: Pid,
    pub name: String,
    pub affinity: AffinityMask,
}

impl ProcessSnapshotEntry {
    pub fn new(pid: Pid, name: impl Into<String>, affinity: AffinityMask) -> Self {
        Self {
            pid,
            name: name.into(),
            affinity,
        }
    }
}

impl std::fmt::Display for ProcessSnapshotEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.pid)
    }
}

/// Snapshot of the process table keyed by (pid, name)
///
/// Pids are reused by the OS, so a pid alone does not identify a process.
/// The pair is only treated as the same process across one interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    entries: BTreeMap<(Pid, String), AffinityMask>,
}

impl ProcessSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries; the first entry wins on duplicate keys
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ProcessSnapshotEntry>,
    {
        let mut map = BTreeMap::new();
        for entry in entries {
            map.entry((entry.pid, entry.name)).or_insert(entry.affinity);
        }
        Self { entries: map }
    }

    /// Capture the live process table
    ///
    /// An affinity read failure keeps the process in the snapshot with its
    /// mask from `previous`, or zero when it is new, so start and end
    /// detection is never corrupted by access-denied or exit races.
    pub fn capture(table: &dyn ProcessTable, previous: &ProcessSnapshot) -> AffinityResult<Self> {
        let mut entries = BTreeMap::new();

        for record in table.processes()? {
            if record.name.is_empty() {
                continue;
            }
            let affinity = match table.affinity(record.pid) {
                Ok(mask) => mask,
                Err(e) => {
                    trace!(pid = record.pid, process = %record.name, error = %e, "affinity unreadable");
                    previous
                        .affinity_of(record.pid, &record.name)
                        .unwrap_or(AffinityMask::EMPTY)
                }
            };
            entries.entry((record.pid, record.name)).or_insert(affinity);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn affinity_of(&self, pid: Pid, name: &str) -> Option<AffinityMask> {
        self.entries.get(&(pid, name.to_string())).copied()
    }

    pub fn contains(&self, pid: Pid, name: &str) -> bool {
        self.affinity_of(pid, name).is_some()
    }

    /// Entries in ascending (pid, name) order
    pub fn entries(&self) -> impl Iterator<Item = ProcessSnapshotEntry> + '_ {
        self.entries
            .iter()
            .map(|((pid, name), &affinity)| ProcessSnapshotEntry::new(*pid, name.clone(), affinity))
    }

    /// Differences from `self` to the newer snapshot `next`
    pub fn diff(&self, next: &ProcessSnapshot) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();

        for ((pid, name), &mask) in &next.entries {
            match self.entries.get(&(*pid, name.clone())) {
                None => diff
                    .started
                    .push(ProcessSnapshotEntry::new(*pid, name.clone(), mask)),
                Some(&old) if old != mask => diff
                    .affinity_changed
                    .push(ProcessSnapshotEntry::new(*pid, name.clone(), mask)),
                Some(_) => {}
            }
        }

        for ((pid, name), &mask) in &self.entries {
            if !next.entries.contains_key(&(*pid, name.clone())) {
                diff.ended
                    .push(ProcessSnapshotEntry::new(*pid, name.clone(), mask));
            }
        }

        diff
    }
}

/// Events computed between two consecutive snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub started: Vec<ProcessSnapshotEntry>,
    pub ended: Vec<ProcessSnapshotEntry>,
    /// Carries the new mask
    pub affinity_changed: Vec<ProcessSnapshotEntry>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.ended.is_empty() && self.affinity_changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.started.len() + self.ended.len() + self.affinity_changed.len()
    }
}
