/*!
 * Affinity Setter Tests
 */

use crate::fake_table::FakeProcessTable;
use ccd_affinity::{AffinityMask, AffinitySetter, SweepSummary};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

#[test]
fn test_set_by_pid_and_read_back() {
    let table = FakeProcessTable::new(16);
    table.spawn(42, "game.exe");
    let setter = AffinitySetter::new(table.clone());

    let message = setter
        .set_by_pid(42, AffinityMask::build(0..4).unwrap())
        .unwrap();
    assert_eq!(message, "Set CPU affinity of game.exe(42) to 0-3");

    let (mask, name) = setter.get_affinity(42).unwrap();
    assert_eq!(mask.bits(), 0b1111);
    assert_eq!(name, "game.exe");
    assert_eq!(setter.describe_pid(42), "0-3");
}

#[test]
fn test_exited_process_is_not_found() {
    let table = FakeProcessTable::new(8);
    table.spawn(7, "short");
    table.kill(7);
    let setter = AffinitySetter::new(table.clone());

    let err = setter.set_by_pid(7, AffinityMask::from_bits(1)).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(setter.describe_pid(7), "Failed to get");
}

#[test]
fn test_set_by_name_reports_each_instance() {
    let table = FakeProcessTable::new(8);
    table.spawn(10, "worker");
    table.spawn(11, "worker");
    table.spawn(12, "worker");
    table.protect(11);
    let setter = AffinitySetter::new(table.clone());

    let report = setter
        .set_by_name("worker", AffinityMask::from_bits(0b11))
        .unwrap();
    assert_eq!(report.succeeded, vec![10, 12]);
    assert_eq!(report.failures.len(), 1);
    assert!(report
        .message()
        .starts_with("Some processes failed to set. Success: 2, Failed: 1"));

    // Successful instances are not rolled back
    assert_eq!(table.mask_of(10), Some(AffinityMask::from_bits(0b11)));
    assert_eq!(table.mask_of(11), Some(AffinityMask::full(8).unwrap()));
}

#[test]
fn test_sweep_skips_excluded_names() {
    let table = FakeProcessTable::new(8);
    table.spawn(1, "init");
    table.spawn(2, "game.exe");
    table.spawn(3, "browser");
    table.protect(1);
    let setter = AffinitySetter::new(table.clone());

    let excluded: HashSet<String> = ["game.exe".to_string()].into_iter().collect();
    let summary = setter
        .apply_to_all_except(AffinityMask::from_bits(0b110000), &excluded)
        .unwrap();

    assert_eq!(summary, SweepSummary { succeeded: 1, failed: 1 });
    assert_eq!(summary.to_string(), "Success: 1, Failed: 1");
    assert_eq!(table.mask_of(2), Some(AffinityMask::full(8).unwrap()));
    assert_eq!(table.mask_of(3), Some(AffinityMask::from_bits(0b110000)));
}

#[test]
fn test_restore_all_uses_every_processor() {
    let table = FakeProcessTable::new(12);
    table.spawn(1, "a");
    table.spawn(2, "b");
    table.force_mask(1, AffinityMask::from_bits(1));
    let setter = AffinitySetter::new(table.clone());

    let summary = setter.restore_all().unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(table.mask_of(1), Some(AffinityMask::from_bits(0xfff)));
}

#[test]
fn test_describe_name_states() {
    let table = FakeProcessTable::new(8);
    table.spawn(1, "svc");
    table.spawn(2, "svc");
    let setter = AffinitySetter::new(table.clone());

    assert_eq!(setter.describe_name("svc"), "0-7");
    table.force_mask(2, AffinityMask::from_bits(1));
    assert_eq!(
        setter.describe_name("svc"),
        "Multiple processes (2) with inconsistent affinity"
    );
    assert_eq!(setter.describe_name("absent"), "Process not running");
}
