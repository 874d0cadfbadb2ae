/*!
 * Core Types
 * Common types used across the crate
 */

/// OS process ID type
pub type Pid = u32;

/// Logical core index (0-63)
pub type CoreId = u8;

/// Common result type for daemon-level operations
pub type DaemonResult<T> = Result<T, super::errors::DaemonError>;

/// Outcome of a best-effort sweep over many processes
///
/// Failures are counted rather than raised so one protected or exited
/// process never aborts the rest of the sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SweepSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl SweepSummary {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl std::fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Success: {}, Failed: {}", self.succeeded, self.failed)
    }
}
