/*!
 * Rule and CCD Stores
 *
 * Persistence for CCD groups (TOML) and monitored process rules (JSON).
 * Saves replace the whole file via a temporary file and rename, so a
 * failed save never leaves a half-written store behind.
 */

use super::types::{CoreGroup, CoreGroupMap, MonitoredProcessRule, RuleMap};
use crate::core::errors::{StoreError, StoreResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// Persistence for CCD groups and the default CCD selection
pub trait ConfigStore: Send + Sync {
    fn load_core_groups(&self) -> StoreResult<CoreGroupMap>;
    fn load_default_ccd(&self) -> StoreResult<Option<String>>;
    fn save(&self, groups: &CoreGroupMap, default_ccd: Option<&str>) -> StoreResult<()>;
}

/// Persistence for monitored process rules
pub trait RuleStore: Send + Sync {
    fn load_rules(&self) -> StoreResult<RuleMap>;
    fn save(&self, rules: &RuleMap) -> StoreResult<()>;
}

/// Read a file, treating a missing file as absent
fn read_optional(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Replace `path` with `contents` via a sibling temporary file
fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents).map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

// =============================================================================
// TOML config store
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_ccd: Option<String>,
    #[serde(default)]
    ccds: BTreeMap<String, CcdEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CcdEntry {
    cores: Vec<i64>,
}

/// CCD groups in a TOML file
///
/// ```toml
/// default_ccd = "ccd1"
///
/// [ccds.ccd0]
/// cores = [0, 1, 2, 3, 4, 5, 6, 7]
/// ```
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoreResult<ConfigFile> {
        let Some(contents) = read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "config file missing, starting empty");
            return Ok(ConfigFile::default());
        };
        toml::from_str(&contents).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

impl ConfigStore for TomlConfigStore {
    fn load_core_groups(&self) -> StoreResult<CoreGroupMap> {
        let file = self.read()?;
        let mut groups = CoreGroupMap::new();
        for (name, entry) in file.ccds {
            let group = CoreGroup::new(name.clone(), entry.cores)
                .map_err(|e| StoreError::Invalid(format!("CCD group {}: {}", name, e)))?;
            groups.insert(name, group);
        }
        Ok(groups)
    }

    fn load_default_ccd(&self) -> StoreResult<Option<String>> {
        Ok(self.read()?.default_ccd.filter(|name| !name.is_empty()))
    }

    fn save(&self, groups: &CoreGroupMap, default_ccd: Option<&str>) -> StoreResult<()> {
        let file = ConfigFile {
            default_ccd: default_ccd.map(str::to_string),
            ccds: groups
                .iter()
                .map(|(name, group)| {
                    (
                        name.clone(),
                        CcdEntry {
                            cores: group.cores.iter().map(|&c| i64::from(c)).collect(),
                        },
                    )
                })
                .collect(),
        };

        let contents = toml::to_string_pretty(&file).map_err(|e| StoreError::Serialize {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        write_atomic(&self.path, &contents)?;
        info!(path = %self.path.display(), groups = groups.len(), "CCD config saved");
        Ok(())
    }
}

// =============================================================================
// JSON rule store
// =============================================================================

/// Monitored process rules as a JSON array of `{process_name, ccd_name}`
#[derive(Debug, Clone)]
pub struct JsonRuleStore {
    path: PathBuf,
}

impl JsonRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleStore for JsonRuleStore {
    fn load_rules(&self) -> StoreResult<RuleMap> {
        let contents = match read_optional(&self.path)? {
            Some(contents) if !contents.trim().is_empty() => contents,
            _ => {
                debug!(path = %self.path.display(), "rule file missing or empty");
                return Ok(RuleMap::new());
            }
        };

        let list: Vec<MonitoredProcessRule> =
            serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let mut rules = RuleMap::new();
        for rule in list {
            if rule.process_name.is_empty() {
                return Err(StoreError::Invalid(
                    "monitored process rule with empty process name".into(),
                ));
            }
            // Later duplicates win
            rules.insert(rule.process_name.clone(), rule);
        }
        Ok(rules)
    }

    fn save(&self, rules: &RuleMap) -> StoreResult<()> {
        let list: Vec<&MonitoredProcessRule> = rules.values().collect();
        let contents =
            serde_json::to_string_pretty(&list).map_err(|e| StoreError::Serialize {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        write_atomic(&self.path, &contents)?;
        info!(path = %self.path.display(), rules = rules.len(), "monitored processes saved");
        Ok(())
    }
}

// =============================================================================
// In-memory stores
// =============================================================================

fn injected_failure(what: &str) -> StoreError {
    StoreError::io(
        what,
        std::io::Error::new(ErrorKind::Other, "injected save failure"),
    )
}

/// In-memory [`ConfigStore`] with save failure injection
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    state: Mutex<(CoreGroupMap, Option<String>)>,
    fail_saves: AtomicBool,
    saves: AtomicU64,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(groups: CoreGroupMap, default_ccd: Option<String>) -> Self {
        Self {
            state: Mutex::new((groups, default_ccd)),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail until reset
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Successful saves so far
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_core_groups(&self) -> StoreResult<CoreGroupMap> {
        Ok(self.state.lock().0.clone())
    }

    fn load_default_ccd(&self) -> StoreResult<Option<String>> {
        Ok(self.state.lock().1.clone())
    }

    fn save(&self, groups: &CoreGroupMap, default_ccd: Option<&str>) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(injected_failure("memory://config"));
        }
        *self.state.lock() = (groups.clone(), default_ccd.map(str::to_string));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory [`RuleStore`] with save failure injection
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: Mutex<RuleMap>,
    fail_saves: AtomicBool,
    saves: AtomicU64,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: RuleMap) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl RuleStore for MemoryRuleStore {
    fn load_rules(&self) -> StoreResult<RuleMap> {
        Ok(self.rules.lock().clone())
    }

    fn save(&self, rules: &RuleMap) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(injected_failure("memory://rules"));
        }
        *self.rules.lock() = rules.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
