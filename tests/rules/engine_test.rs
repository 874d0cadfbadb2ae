/*!
 * Rule Engine Tests
 */

use crate::fake_table::FakeProcessTable;
use ccd_affinity::{
    AffinityMask, AffinitySetter, CcdRegistry, MemoryConfigStore, MemoryRuleStore,
    MonitoredProcessRule, ProcessEventKind, ProcessSampler, RuleApplied, RuleEngine,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    table: Arc<FakeProcessTable>,
    engine: Arc<RuleEngine>,
    sampler: Arc<ProcessSampler>,
}

/// ccdA = 0-3, ccdB = 4-5 (default), game.exe -> ccdA
fn harness() -> Harness {
    let table = FakeProcessTable::new(16);
    table.spawn(1, "init");

    let registry = Arc::new(CcdRegistry::load(Arc::new(MemoryConfigStore::new())).unwrap());
    registry.upsert_ccd("ccdA", 0..4).unwrap();
    registry.upsert_ccd("ccdB", [4, 5]).unwrap();
    registry.set_default_ccd(Some("ccdB")).unwrap();

    let engine = RuleEngine::new(
        AffinitySetter::new(table.clone()),
        registry,
        Arc::new(MemoryRuleStore::new()),
    )
    .unwrap();
    engine
        .add_rule(MonitoredProcessRule::new("game.exe", "ccdA"))
        .unwrap();

    let sampler = ProcessSampler::new(table.clone(), Duration::from_secs(1));
    sampler.take_baseline().unwrap();
    engine.attach(sampler.as_ref());

    Harness {
        table,
        engine,
        sampler,
    }
}

#[test]
fn test_started_process_pinned_by_rule() {
    let h = harness();
    h.engine.set_auto_apply(true);

    h.table.spawn(10, "game.exe");
    h.sampler.tick().unwrap();

    assert_eq!(h.table.mask_of(10), Some(AffinityMask::from_bits(0b1111)));
}

#[test]
fn test_unmatched_process_gets_default() {
    let h = harness();
    h.engine.set_auto_apply(true);

    h.table.spawn(20, "browser");
    h.sampler.tick().unwrap();

    assert_eq!(h.table.mask_of(20), Some(AffinityMask::from_bits(0b110000)));
}

#[test]
fn test_auto_apply_off_leaves_processes_alone() {
    let h = harness();
    let matched = Arc::new(Mutex::new(Vec::new()));
    let m = matched.clone();
    h.engine
        .events()
        .subscribe_all(move |kind, e| m.lock().push((kind, e.pid)));

    h.table.spawn(10, "game.exe");
    h.table.spawn(20, "browser");
    h.sampler.tick().unwrap();

    assert_eq!(h.table.writes(), 0);
    // Rule-matched events are still re-published
    assert_eq!(*matched.lock(), vec![(ProcessEventKind::Started, 10)]);
}

#[test]
fn test_filtered_events_follow_rule_matches() {
    let h = harness();
    let matched = Arc::new(Mutex::new(Vec::new()));
    let m = matched.clone();
    h.engine
        .events()
        .subscribe_all(move |kind, e| m.lock().push((kind, e.name.clone())));

    h.table.spawn(10, "game.exe");
    h.table.spawn(20, "browser");
    h.sampler.tick().unwrap();
    h.table.kill(10);
    h.table.kill(20);
    h.sampler.tick().unwrap();

    assert_eq!(
        *matched.lock(),
        vec![
            (ProcessEventKind::Started, "game.exe".to_string()),
            (ProcessEventKind::Ended, "game.exe".to_string()),
        ]
    );
}

#[test]
fn test_apply_all_rules_now_is_idempotent() {
    let h = harness();
    h.table.spawn(10, "game.exe");
    h.table.spawn(11, "game.exe");
    h.table.spawn(20, "browser");

    let first = h.engine.apply_all_rules_now().unwrap();
    let masks: Vec<_> = [1, 10, 11, 20].iter().map(|&p| h.table.mask_of(p)).collect();
    let second = h.engine.apply_all_rules_now().unwrap();
    let again: Vec<_> = [1, 10, 11, 20].iter().map(|&p| h.table.mask_of(p)).collect();

    assert_eq!(masks, again);
    assert_eq!(first, second);
    assert_eq!(
        h.engine.setter().get_affinity(10).unwrap().0,
        AffinityMask::from_bits(0b1111)
    );
    assert_eq!(
        h.engine.setter().get_affinity(1).unwrap().0,
        AffinityMask::from_bits(0b110000)
    );
}

#[test]
fn test_deleted_group_becomes_dangling() {
    let h = harness();
    h.engine.set_auto_apply(true);
    assert!(h.engine.registry().delete_ccd("ccdA").unwrap());
    assert_eq!(h.engine.dangling_rules().len(), 1);

    h.table.spawn(10, "game.exe");
    h.sampler.tick().unwrap();
    assert_eq!(h.table.mask_of(10), Some(AffinityMask::full(16).unwrap()));

    let report = h.engine.apply_all_rules_now().unwrap();
    assert_eq!(report.dangling.len(), 1);
    assert!(report.applied.is_empty());
    // The dangling rule's process still counts as covered by a rule
    assert_eq!(h.table.mask_of(10), Some(AffinityMask::full(16).unwrap()));
}

#[test]
fn test_rule_applied_events() {
    let h = harness();
    h.engine.set_auto_apply(true);
    let outcomes: Arc<Mutex<Vec<RuleApplied>>> = Arc::new(Mutex::new(Vec::new()));
    let o = outcomes.clone();
    h.engine
        .rule_applied()
        .subscribe(move |outcome| o.lock().push(outcome.clone()));

    h.table.spawn(10, "game.exe");
    h.table.spawn(30, "protected");
    h.table.protect(30);
    h.sampler.tick().unwrap();

    let outcomes = outcomes.lock();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().any(|o| o.pid == Some(10) && o.success));
    assert!(outcomes
        .iter()
        .any(|o| o.pid == Some(30) && !o.success && o.ccd_name == "ccdB"));
}

#[test]
fn test_detach_stops_reactions() {
    let h = harness();
    h.engine.set_auto_apply(true);
    let sampler = ProcessSampler::new(h.table.clone(), Duration::from_secs(1));
    sampler.take_baseline().unwrap();
    let subscription = h.engine.attach(sampler.as_ref());
    assert!(h.engine.detach(sampler.as_ref(), subscription));

    h.table.spawn(10, "game.exe");
    sampler.tick().unwrap();
    assert_eq!(h.table.writes(), 0);
}

#[test]
fn test_status_listing() {
    let h = harness();
    h.table.spawn(10, "game.exe");
    h.engine.apply_all_rules_now().unwrap();

    let rows = h.engine.status();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].display_name, "game.exe");
    assert_eq!(rows[0].affinity, "0-3");
    assert_eq!(rows[1].display_name, "Default (Other Processes)");
    assert_eq!(rows[1].affinity, "4-5");
}
