/*!
 * Linux Process Table
 * /proc enumeration with sched_getaffinity/sched_setaffinity
 */

use super::mask::AffinityMask;
use super::traits::{ProcessRecord, ProcessTable};
use crate::core::errors::{AffinityError, AffinityResult};
use crate::core::limits::MAX_CORES;
use crate::core::types::Pid;
use nix::errno::Errno;
use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid as NixPid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Bytes the kernel keeps in `/proc/<pid>/comm` (TASK_COMM_LEN minus the NUL)
const COMM_MAX_LEN: usize = 15;

/// Machine-wide CPU index list, independent of any task's affinity
const CPU_PRESENT_LIST: &str = "/sys/devices/system/cpu/present";

/// Process table backed by procfs
///
/// Linux affinity is per thread, so writes are applied to every task listed
/// under `/proc/<pid>/task` to match whole-process semantics.
#[derive(Debug, Clone)]
pub struct ProcFsTable {
    root: PathBuf,
    cpu_list: PathBuf,
}

impl ProcFsTable {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cpu_list: PathBuf::from(CPU_PRESENT_LIST),
        }
    }

    /// Read the processor count from `path` instead of sysfs
    pub fn with_cpu_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.cpu_list = path.into();
        self
    }

    fn process_dir(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_comm(&self, pid: Pid) -> io::Result<String> {
        let raw = fs::read_to_string(self.process_dir(pid).join("comm"))?;
        Ok(raw.trim_end_matches('\n').to_string())
    }

    /// Full process name
    ///
    /// `comm` is cut to 15 bytes. When it is that long, the executable name
    /// and then `argv[0]` are tried, and used only if they extend `comm`.
    /// Kernel threads have neither and keep `comm`.
    fn read_name(&self, pid: Pid) -> io::Result<String> {
        let comm = self.read_comm(pid)?;
        if comm.len() < COMM_MAX_LEN {
            return Ok(comm);
        }

        let extends = |name: &String| name.len() > comm.len() && name.starts_with(comm.as_str());
        let full = self
            .exe_name(pid)
            .filter(extends)
            .or_else(|| self.argv0_name(pid).filter(extends));
        Ok(full.unwrap_or(comm))
    }

    fn exe_name(&self, pid: Pid) -> Option<String> {
        let target = fs::read_link(self.process_dir(pid).join("exe")).ok()?;
        let name = target.file_name()?.to_str()?;
        Some(name.trim_end_matches(" (deleted)").to_string())
    }

    fn argv0_name(&self, pid: Pid) -> Option<String> {
        let raw = fs::read(self.process_dir(pid).join("cmdline")).ok()?;
        let argv0 = raw.split(|&b| b == 0).next()?;
        let base = argv0.rsplit(|&b| b == b'/').next()?;
        if base.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(base).into_owned())
    }

    fn task_ids(&self, pid: Pid) -> AffinityResult<Vec<Pid>> {
        let dir = self.process_dir(pid).join("task");
        match fs::read_dir(&dir) {
            Ok(entries) => {
                let mut tids: Vec<Pid> = entries
                    .flatten()
                    .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
                    .collect();
                if tids.is_empty() {
                    tids.push(pid);
                }
                Ok(tids)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(AffinityError::ProcessNotFound(format!("pid {}", pid)))
            }
            Err(e) => {
                debug!(pid, error = %e, "task list unreadable, writing main thread only");
                Ok(vec![pid])
            }
        }
    }
}

impl Default for ProcFsTable {
    fn default() -> Self {
        Self::new()
    }
}

fn nix_pid(pid: Pid) -> AffinityResult<NixPid> {
    i32::try_from(pid)
        .map(NixPid::from_raw)
        .map_err(|_| AffinityError::ProcessNotFound(format!("pid {}", pid)))
}

fn map_errno(errno: Errno, pid: Pid) -> AffinityError {
    match errno {
        Errno::ESRCH => AffinityError::ProcessNotFound(format!("pid {}", pid)),
        Errno::EPERM | Errno::EACCES => AffinityError::PermissionDenied(format!("pid {}", pid)),
        other => AffinityError::Os(format!("pid {}: {}", pid, other.desc())),
    }
}

fn map_io(err: io::Error, pid: Pid) -> AffinityError {
    match err.kind() {
        io::ErrorKind::NotFound => AffinityError::ProcessNotFound(format!("pid {}", pid)),
        io::ErrorKind::PermissionDenied => AffinityError::PermissionDenied(format!("pid {}", pid)),
        _ => AffinityError::Os(format!("pid {}: {}", pid, err)),
    }
}

/// Processor count from a kernel CPU list such as `0-7,16-23`
///
/// The count is the highest listed index plus one, so a full mask built from
/// it covers every listed CPU.
fn parse_cpu_list(list: &str) -> Option<usize> {
    let mut highest: Option<usize> = None;
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        let last = match part.split_once('-') {
            Some((start, end)) => {
                let start: usize = start.trim().parse().ok()?;
                let end: usize = end.trim().parse().ok()?;
                if end < start {
                    return None;
                }
                end
            }
            None => part.trim().parse().ok()?,
        };
        highest = Some(highest.map_or(last, |h| h.max(last)));
    }
    highest.map(|h| h + 1)
}

fn read_cpu_list(path: &Path) -> Option<usize> {
    let raw = fs::read_to_string(path).ok()?;
    parse_cpu_list(&raw)
}

fn to_cpu_set(mask: AffinityMask) -> AffinityResult<CpuSet> {
    let mut set = CpuSet::new();
    for core in mask.iter() {
        set.set(usize::from(core))
            .map_err(|e| AffinityError::InvalidCore(format!("core {}: {}", core, e.desc())))?;
    }
    Ok(set)
}

fn from_cpu_set(set: &CpuSet) -> AffinityMask {
    let bits = (0..MAX_CORES)
        .filter(|&core| set.is_set(core).unwrap_or(false))
        .fold(0u64, |acc, core| acc | (1u64 << core));
    AffinityMask::from_bits(bits)
}

impl ProcessTable for ProcFsTable {
    fn processes(&self) -> AffinityResult<Vec<ProcessRecord>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            AffinityError::Os(format!("cannot enumerate {}: {}", self.root.display(), e))
        })?;

        let records = entries
            .flatten()
            .filter_map(|entry| {
                let pid: Pid = entry.file_name().to_str()?.parse().ok()?;
                match self.read_name(pid) {
                    Ok(name) if !name.is_empty() => Some(ProcessRecord { pid, name }),
                    Ok(_) => None,
                    Err(e) => {
                        trace!(pid, error = %e, "skipping unreadable process");
                        None
                    }
                }
            })
            .collect();

        Ok(records)
    }

    fn process_name(&self, pid: Pid) -> AffinityResult<String> {
        self.read_name(pid).map_err(|e| map_io(e, pid))
    }

    fn affinity(&self, pid: Pid) -> AffinityResult<AffinityMask> {
        let set = sched_getaffinity(nix_pid(pid)?).map_err(|e| map_errno(e, pid))?;
        Ok(from_cpu_set(&set))
    }

    fn set_affinity(&self, pid: Pid, mask: AffinityMask) -> AffinityResult<()> {
        if mask.is_empty() {
            return Err(AffinityError::InvalidCore(
                "refusing to write an empty affinity mask".into(),
            ));
        }
        let set = to_cpu_set(mask)?;

        let mut written = 0usize;
        let mut first_error = None;
        for tid in self.task_ids(pid)? {
            match sched_setaffinity(nix_pid(tid)?, &set) {
                Ok(()) => written += 1,
                // Threads exit while we iterate
                Err(Errno::ESRCH) => {}
                Err(e) => {
                    first_error.get_or_insert(map_errno(e, pid));
                }
            }
        }

        match (written, first_error) {
            (_, Some(err)) => Err(err),
            (0, None) => Err(AffinityError::ProcessNotFound(format!("pid {}", pid))),
            _ => Ok(()),
        }
    }

    fn processor_count(&self) -> usize {
        match read_cpu_list(&self.cpu_list) {
            Some(count) => count,
            None => {
                // num_cpus reports this process's allowed set, so it is only a fallback
                debug!(path = %self.cpu_list.display(), "CPU list unreadable, using num_cpus");
                num_cpus::get()
            }
        }
    }
}
