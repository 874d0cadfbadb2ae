/*!
 * Affinity Module
 * Core bitmask algebra and OS affinity access
 */

pub mod mask;
#[cfg(target_os = "linux")]
pub mod procfs;
pub mod setter;
pub mod traits;

pub use mask::{format_core_list, AffinityMask};
#[cfg(target_os = "linux")]
pub use procfs::ProcFsTable;
pub use setter::{AffinitySetter, ApplyReport};
pub use traits::{ProcessRecord, ProcessTable};

use crate::core::errors::AffinityResult;
use std::sync::Arc;

/// Process table for the host platform
#[cfg(target_os = "linux")]
pub fn system_process_table() -> AffinityResult<Arc<dyn ProcessTable>> {
    Ok(Arc::new(ProcFsTable::new()))
}

/// Process table for the host platform
#[cfg(not(target_os = "linux"))]
pub fn system_process_table() -> AffinityResult<Arc<dyn ProcessTable>> {
    Err(crate::core::errors::AffinityError::Os(
        "process affinity control is only supported on Linux".into(),
    ))
}
