/*!
 * CCD Registry
 * Named core groups and the default CCD, persisted through a ConfigStore
 */

use super::store::ConfigStore;
use super::types::{CcdConfig, CoreGroup};
use crate::core::errors::{RuleError, RuleResult};
use crate::core::sync::RcuCell;
use std::sync::Arc;
use tracing::{info, warn};

/// Live CCD group set
///
/// Every mutation builds the next state, persists it, and only then makes it
/// visible to readers. A failed save leaves the in-memory state untouched.
pub struct CcdRegistry {
    store: Arc<dyn ConfigStore>,
    state: RcuCell<CcdConfig>,
}

impl CcdRegistry {
    /// Load groups and the default selection from `store`
    pub fn load(store: Arc<dyn ConfigStore>) -> RuleResult<Self> {
        let config = Self::read(store.as_ref())?;
        info!(
            groups = config.groups.len(),
            default_ccd = config.default_ccd.as_deref().unwrap_or("-"),
            "CCD groups loaded"
        );
        Ok(Self {
            store,
            state: RcuCell::new(config),
        })
    }

    fn read(store: &dyn ConfigStore) -> RuleResult<CcdConfig> {
        let config = CcdConfig {
            groups: store.load_core_groups()?,
            default_ccd: store.load_default_ccd()?,
        };
        if let Some(name) = &config.default_ccd {
            if !config.groups.contains_key(name) {
                warn!(default_ccd = %name, "default CCD references a missing group");
            }
        }
        Ok(config)
    }

    /// Re-read the store, replacing the in-memory state
    pub fn reload(&self) -> RuleResult<()> {
        let config = Self::read(self.store.as_ref())?;
        self.state.store(config);
        Ok(())
    }

    /// Immutable view of the current state
    pub fn snapshot(&self) -> Arc<CcdConfig> {
        self.state.load()
    }

    pub fn get(&self, name: &str) -> Option<CoreGroup> {
        self.state.load().groups.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.load().groups.contains_key(name)
    }

    /// Groups in name order
    pub fn groups(&self) -> Vec<CoreGroup> {
        self.state.load().groups.values().cloned().collect()
    }

    pub fn default_ccd(&self) -> Option<String> {
        self.state.load().default_ccd.clone()
    }

    /// The default group, if one is selected and still exists
    pub fn default_group(&self) -> Option<CoreGroup> {
        self.state.load().default_group().cloned()
    }

    /// Create or replace a group
    pub fn upsert_ccd<I>(&self, name: &str, cores: I) -> RuleResult<CoreGroup>
    where
        I: IntoIterator,
        I::Item: Into<i64>,
    {
        let group = CoreGroup::new(name, cores)?;

        self.state.try_update(|current| {
            let mut next = current.clone();
            next.groups.insert(group.name.clone(), group.clone());
            self.store.save(&next.groups, next.default_ccd.as_deref())?;
            Ok::<_, RuleError>(next)
        })?;

        info!(ccd = %group.name, cores = %group.describe(), "CCD group saved");
        Ok(group)
    }

    /// Remove a group; returns false if it did not exist
    ///
    /// Rules and the default selection that name the group are left in
    /// place and become dangling references.
    pub fn delete_ccd(&self, name: &str) -> RuleResult<bool> {
        let mut removed = false;
        self.state.try_update(|current| {
            if !current.groups.contains_key(name) {
                return Ok::<_, RuleError>(current.clone());
            }
            let mut next = current.clone();
            next.groups.remove(name);
            self.store.save(&next.groups, next.default_ccd.as_deref())?;
            removed = true;
            Ok(next)
        })?;

        if removed {
            info!(ccd = %name, "CCD group deleted");
            if self.default_ccd().as_deref() == Some(name) {
                warn!(ccd = %name, "deleted group was the default CCD");
            }
        }
        Ok(removed)
    }

    /// Select the default group, or clear the selection with `None`
    pub fn set_default_ccd(&self, name: Option<&str>) -> RuleResult<()> {
        self.state.try_update(|current| {
            if let Some(name) = name {
                if !current.groups.contains_key(name) {
                    return Err(RuleError::UnknownCoreGroup(name.to_string()));
                }
            }
            let mut next = current.clone();
            next.default_ccd = name.map(str::to_string);
            self.store.save(&next.groups, next.default_ccd.as_deref())?;
            Ok::<_, RuleError>(next)
        })?;

        info!(default_ccd = name.unwrap_or("-"), "default CCD updated");
        Ok(())
    }
}

impl std::fmt::Debug for CcdRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CcdRegistry")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
