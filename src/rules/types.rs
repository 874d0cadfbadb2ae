/*!
 * Rule Types
 * CCD core groups, monitored process rules, and status rows
 */

use crate::affinity::{format_core_list, AffinityMask};
use crate::core::errors::{AffinityResult, RuleError, RuleResult};
use crate::core::types::{CoreId, SweepSummary};
use crate::monitoring::RuleApplied;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Named set of cores treated as one affinity unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreGroup {
    pub name: String,
    pub cores: BTreeSet<CoreId>,
}

impl CoreGroup {
    /// Validated constructor: non-empty name, non-empty cores within 0-63
    pub fn new<I>(name: impl Into<String>, cores: I) -> RuleResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<i64>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RuleError::InvalidCoreGroup(
                "CCD name cannot be empty".into(),
            ));
        }
        let mask = AffinityMask::build(cores)?;
        Ok(Self {
            name,
            cores: mask.iter().collect(),
        })
    }

    pub fn mask(&self) -> AffinityResult<AffinityMask> {
        AffinityMask::build(self.cores.iter().copied())
    }

    /// Cores as a range string, e.g. "0-7"
    pub fn describe(&self) -> String {
        let cores: Vec<CoreId> = self.cores.iter().copied().collect();
        format_core_list(&cores)
    }
}

/// Pins every process called `process_name` to the group `ccd_name`
///
/// The group reference is resolved when the rule is applied, not when it is
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitoredProcessRule {
    pub process_name: String,
    pub ccd_name: String,
}

impl MonitoredProcessRule {
    pub fn new(process_name: impl Into<String>, ccd_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            ccd_name: ccd_name.into(),
        }
    }
}

/// A rule whose CCD group no longer exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingRule {
    pub process_name: String,
    pub ccd_name: String,
}

impl From<DanglingRule> for RuleError {
    fn from(rule: DanglingRule) -> Self {
        RuleError::DanglingRuleReference {
            process: rule.process_name,
            ccd: rule.ccd_name,
        }
    }
}

pub type CoreGroupMap = BTreeMap<String, CoreGroup>;
pub type RuleMap = BTreeMap<String, MonitoredProcessRule>;

/// CCD groups plus the optional default selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CcdConfig {
    pub groups: CoreGroupMap,
    pub default_ccd: Option<String>,
}

impl CcdConfig {
    pub fn default_group(&self) -> Option<&CoreGroup> {
        self.default_ccd
            .as_deref()
            .and_then(|name| self.groups.get(name))
    }
}

/// Outcome of a bulk rule re-assertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyAllReport {
    pub applied: Vec<RuleApplied>,
    pub dangling: Vec<DanglingRule>,
    /// None when no usable default CCD is configured
    pub default_sweep: Option<SweepSummary>,
}

/// One row of the monitored-process listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleStatus {
    pub process_name: String,
    pub display_name: String,
    pub ccd_name: String,
    pub affinity: String,
    pub is_default: bool,
}
