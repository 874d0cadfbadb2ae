/*!
 * In-memory process table shared by the integration tests
 */

#![allow(dead_code)]

use ccd_affinity::{AffinityError, AffinityMask, AffinityResult, Pid, ProcessRecord, ProcessTable};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

struct FakeProcess {
    name: String,
    mask: AffinityMask,
}

#[derive(Default)]
struct FakeState {
    processes: BTreeMap<Pid, FakeProcess>,
    protected: HashSet<Pid>,
    fail_enumeration: bool,
    writes: usize,
}

/// Process table backed by a map; new processes may run on every core
pub struct FakeProcessTable {
    state: Mutex<FakeState>,
    cores: usize,
}

impl FakeProcessTable {
    pub fn new(cores: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            cores,
        })
    }

    pub fn spawn(&self, pid: Pid, name: &str) {
        let mask = AffinityMask::full(self.cores).unwrap();
        self.state.lock().processes.insert(
            pid,
            FakeProcess {
                name: name.to_string(),
                mask,
            },
        );
    }

    pub fn kill(&self, pid: Pid) {
        self.state.lock().processes.remove(&pid);
    }

    /// Affinity writes to `pid` fail with PermissionDenied
    pub fn protect(&self, pid: Pid) {
        self.state.lock().protected.insert(pid);
    }

    /// Change a mask behind the engine's back
    pub fn force_mask(&self, pid: Pid, mask: AffinityMask) {
        if let Some(process) = self.state.lock().processes.get_mut(&pid) {
            process.mask = mask;
        }
    }

    pub fn set_fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    pub fn mask_of(&self, pid: Pid) -> Option<AffinityMask> {
        self.state.lock().processes.get(&pid).map(|p| p.mask)
    }

    /// Successful affinity writes so far
    pub fn writes(&self) -> usize {
        self.state.lock().writes
    }
}

impl ProcessTable for FakeProcessTable {
    fn processes(&self) -> AffinityResult<Vec<ProcessRecord>> {
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(AffinityError::Os("process table unavailable".into()));
        }
        Ok(state
            .processes
            .iter()
            .map(|(&pid, p)| ProcessRecord::new(pid, p.name.clone()))
            .collect())
    }

    fn process_name(&self, pid: Pid) -> AffinityResult<String> {
        self.state
            .lock()
            .processes
            .get(&pid)
            .map(|p| p.name.clone())
            .ok_or_else(|| AffinityError::ProcessNotFound(format!("pid {}", pid)))
    }

    fn affinity(&self, pid: Pid) -> AffinityResult<AffinityMask> {
        self.state
            .lock()
            .processes
            .get(&pid)
            .map(|p| p.mask)
            .ok_or_else(|| AffinityError::ProcessNotFound(format!("pid {}", pid)))
    }

    fn set_affinity(&self, pid: Pid, mask: AffinityMask) -> AffinityResult<()> {
        let mut state = self.state.lock();
        if state.protected.contains(&pid) {
            return Err(AffinityError::PermissionDenied(format!("pid {}", pid)));
        }
        let process = state
            .processes
            .get_mut(&pid)
            .ok_or_else(|| AffinityError::ProcessNotFound(format!("pid {}", pid)))?;
        process.mask = mask;
        state.writes += 1;
        Ok(())
    }

    fn processor_count(&self) -> usize {
        self.cores
    }
}
