/*!
 * File Store Tests
 */

use crate::fake_table::FakeProcessTable;
use ccd_affinity::{
    AffinitySetter, CcdRegistry, ConfigStore, DaemonConfig, JsonRuleStore, MonitoredProcessRule,
    RuleEngine, RuleError, RuleStore, TomlConfigStore,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn file_engine(config: &DaemonConfig) -> Arc<RuleEngine> {
    let registry =
        Arc::new(CcdRegistry::load(Arc::new(TomlConfigStore::new(config.config_file()))).unwrap());
    RuleEngine::new(
        AffinitySetter::new(FakeProcessTable::new(16)),
        registry,
        Arc::new(JsonRuleStore::new(config.rules_file())),
    )
    .unwrap()
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = DaemonConfig::with_config_dir(dir.path());

    let engine = file_engine(&config);
    engine.registry().upsert_ccd("ccd0", 0..8).unwrap();
    engine.registry().upsert_ccd("ccd1", 8..16).unwrap();
    engine.registry().set_default_ccd(Some("ccd1")).unwrap();
    engine
        .add_rule(MonitoredProcessRule::new("game.exe", "ccd0"))
        .unwrap();
    drop(engine);

    let engine = file_engine(&config);
    assert_eq!(engine.registry().groups().len(), 2);
    assert_eq!(engine.registry().default_ccd().as_deref(), Some("ccd1"));
    assert_eq!(
        engine.rule("game.exe"),
        Some(MonitoredProcessRule::new("game.exe", "ccd0"))
    );
}

#[test]
fn test_reload_picks_up_external_edits() {
    let dir = TempDir::new().unwrap();
    let config = DaemonConfig::with_config_dir(dir.path());
    let engine = file_engine(&config);
    assert!(engine.rules().is_empty());

    fs::write(
        config.config_file(),
        "default_ccd = \"slow\"\n\n[ccds.slow]\ncores = [12, 13, 14, 15]\n",
    )
    .unwrap();
    fs::write(
        config.rules_file(),
        r#"[{"process_name": "encoder", "ccd_name": "slow"}]"#,
    )
    .unwrap();

    engine.reload().unwrap();
    assert_eq!(engine.rules().len(), 1);
    assert_eq!(engine.registry().default_group().unwrap().describe(), "12-15");
}

#[test]
fn test_corrupt_rule_file_fails_reload_without_clobbering() {
    let dir = TempDir::new().unwrap();
    let config = DaemonConfig::with_config_dir(dir.path());
    let engine = file_engine(&config);
    engine
        .add_rule(MonitoredProcessRule::new("game.exe", "ccd0"))
        .unwrap();

    fs::write(config.rules_file(), "{ not json").unwrap();
    assert!(matches!(engine.reload(), Err(RuleError::Store(_))));
    assert!(engine.rule("game.exe").is_some());
}

#[test]
fn test_store_files_are_readable_formats() {
    let dir = TempDir::new().unwrap();
    let config = DaemonConfig::with_config_dir(dir.path());
    let engine = file_engine(&config);
    engine.registry().upsert_ccd("ccd0", [0, 1]).unwrap();
    engine
        .add_rule(MonitoredProcessRule::new("game.exe", "ccd0"))
        .unwrap();

    let toml = fs::read_to_string(config.config_file()).unwrap();
    assert!(toml.contains("ccd0"));
    let rules: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config.rules_file()).unwrap()).unwrap();
    assert_eq!(rules[0]["ccd_name"], "ccd0");

    let groups = TomlConfigStore::new(config.config_file())
        .load_core_groups()
        .unwrap();
    assert_eq!(groups["ccd0"].describe(), "0-1");
    let loaded = JsonRuleStore::new(config.rules_file()).load_rules().unwrap();
    assert_eq!(loaded.len(), 1);
}
