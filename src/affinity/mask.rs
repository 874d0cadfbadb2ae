/*!
 * Affinity Mask
 * Pure 64-bit core bitmask algebra and human-readable range formatting
 */

use crate::core::errors::{AffinityError, AffinityResult};
use crate::core::limits::{MAX_CORES, MAX_CORE_INDEX, NO_CORES_BOUND};
use crate::core::types::CoreId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU affinity bitmask: bit `i` set means logical core `i` is allowed
///
/// Fixed at one machine word. Hosts with more than 64 logical cores are
/// not addressable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AffinityMask(u64);

impl AffinityMask {
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Build a mask from a core list
    ///
    /// Fails with `InvalidCore` on an empty list or any index outside 0-63.
    /// Duplicates are harmless.
    pub fn build<I>(cores: I) -> AffinityResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<i64>,
    {
        let mut bits = 0u64;
        let mut seen_any = false;

        for core in cores {
            let core: i64 = core.into();
            if !(0..=i64::from(MAX_CORE_INDEX)).contains(&core) {
                return Err(AffinityError::InvalidCore(format!(
                    "core {} is outside 0-{}",
                    core, MAX_CORE_INDEX
                )));
            }
            bits |= 1u64 << core;
            seen_any = true;
        }

        if !seen_any {
            return Err(AffinityError::InvalidCore(
                "at least one core must be specified".into(),
            ));
        }

        Ok(Self(bits))
    }

    /// Mask with the first `count` cores enabled, capped at 64
    pub fn full(count: usize) -> AffinityResult<Self> {
        match count.min(MAX_CORES) {
            0 => Err(AffinityError::InvalidCore(
                "processor count must be at least one".into(),
            )),
            MAX_CORES => Ok(Self(u64::MAX)),
            n => Ok(Self((1u64 << n) - 1)),
        }
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub fn contains(self, core: CoreId) -> bool {
        usize::from(core) < MAX_CORES && self.0 & (1u64 << core) != 0
    }

    /// Enabled cores in ascending order
    pub fn iter(self) -> impl Iterator<Item = CoreId> {
        (0..MAX_CORES as u8).filter(move |&core| self.0 & (1u64 << core) != 0)
    }

    /// Enabled cores in ascending order
    pub fn enabled_cores(self) -> Vec<CoreId> {
        self.iter().collect()
    }

    /// Compact range rendering, e.g. "0-7, 16-23"
    pub fn to_human_readable(self) -> String {
        render_ranges(self.iter().map(u32::from))
    }
}

impl From<AffinityMask> for u64 {
    fn from(mask: AffinityMask) -> Self {
        mask.0
    }
}

impl fmt::Display for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human_readable())
    }
}

impl fmt::LowerHex for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

/// Render an unordered core list as ranges
///
/// The list is sorted and de-duplicated first, so `[3, 1, 2, 2]` renders as
/// "1-3".
pub fn format_core_list(cores: &[CoreId]) -> String {
    let mut sorted: Vec<u32> = cores.iter().map(|&c| u32::from(c)).collect();
    sorted.sort_unstable();
    sorted.dedup();
    render_ranges(sorted.into_iter())
}

fn render_ranges(mut cores: impl Iterator<Item = u32>) -> String {
    let Some(first) = cores.next() else {
        return NO_CORES_BOUND.to_string();
    };

    let mut ranges: Vec<String> = Vec::new();
    let mut push = |start: u32, end: u32| {
        if start == end {
            ranges.push(start.to_string());
        } else {
            ranges.push(format!("{}-{}", start, end));
        }
    };

    let (mut start, mut prev) = (first, first);
    for core in cores {
        if core != prev + 1 {
            push(start, prev);
            start = core;
        }
        prev = core;
    }
    push(start, prev);

    ranges.join(", ")
}
