/*!
 * Limits and Constants
 *
 * Centralized location for affinity limits, timing defaults, and the display
 * strings shared between the engine and its observers.
 */

use std::time::Duration;

// =============================================================================
// AFFINITY LIMITS
// =============================================================================

/// Number of addressable logical cores
/// The affinity mask is a single 64-bit word, so core indices are 0..=63
pub const MAX_CORES: usize = 64;

/// Highest valid core index
pub const MAX_CORE_INDEX: u8 = (MAX_CORES - 1) as u8;

// =============================================================================
// TIMING DEFAULTS
// =============================================================================

/// Default process table sampling interval (1 second)
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default debounce window for observer refreshes (1 second)
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(1000);

/// Default staleness ceiling for the debouncer (5 seconds)
/// A trigger arriving after this long without a run executes immediately
pub const DEFAULT_MAX_STALENESS: Duration = Duration::from_millis(5000);

/// Sampler tick duration above which a slow-tick warning is logged
pub const SLOW_TICK_THRESHOLD: Duration = Duration::from_millis(250);

// =============================================================================
// DISPLAY STRINGS
// =============================================================================

/// Rendering of an empty mask or core list
pub const NO_CORES_BOUND: &str = "No cores bound";

/// Affinity column for a rule whose group is missing, or an unset default
pub const NOT_SET: &str = "Not set";

/// Affinity column for a rule whose process has no live instance
pub const PROCESS_NOT_RUNNING: &str = "Process not running";

/// Display name of the default row in the status listing
pub const DEFAULT_ROW_NAME: &str = "Default (Other Processes)";

// =============================================================================
// STORAGE
// =============================================================================

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "cpu-affinity-manager";

/// CCD configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Monitored process rules file name
pub const RULES_FILE_NAME: &str = "monitored_processes.json";
