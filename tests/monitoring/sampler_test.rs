/*!
 * Process Sampler Tests
 */

use crate::fake_table::FakeProcessTable;
use ccd_affinity::{AffinityMask, ProcessEventKind, ProcessEventSource, ProcessSampler};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

type Seen = Arc<Mutex<Vec<(ProcessEventKind, u32, String)>>>;

fn record(sampler: &ProcessSampler) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    sampler
        .events()
        .subscribe_all(move |kind, e| s.lock().push((kind, e.pid, e.name.clone())));
    seen
}

#[test]
fn test_lifecycle_between_ticks() {
    let table = FakeProcessTable::new(8);
    table.spawn(1, "init");
    let sampler = ProcessSampler::new(table.clone(), Duration::from_secs(1));
    sampler.take_baseline().unwrap();
    let seen = record(&sampler);

    table.spawn(2, "game.exe");
    sampler.tick().unwrap();
    table.force_mask(2, AffinityMask::from_bits(0b1111));
    sampler.tick().unwrap();
    table.kill(2);
    sampler.tick().unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            (ProcessEventKind::Started, 2, "game.exe".to_string()),
            (ProcessEventKind::AffinityChanged, 2, "game.exe".to_string()),
            (ProcessEventKind::Ended, 2, "game.exe".to_string()),
        ]
    );
}

#[test]
fn test_enumeration_failure_is_not_mass_exit() {
    let table = FakeProcessTable::new(8);
    table.spawn(1, "init");
    table.spawn(2, "game.exe");
    let sampler = ProcessSampler::new(table.clone(), Duration::from_secs(1));
    sampler.take_baseline().unwrap();
    let seen = record(&sampler);

    table.set_fail_enumeration(true);
    assert!(sampler.tick().is_err());
    table.set_fail_enumeration(false);
    assert!(sampler.tick().unwrap().is_empty());

    assert!(seen.lock().is_empty());
    assert_eq!(sampler.last_snapshot().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_running_loop_publishes_starts() {
    let table = FakeProcessTable::new(8);
    table.spawn(1, "init");
    let sampler = ProcessSampler::new(table.clone(), Duration::from_millis(100));
    let seen = record(&sampler);

    sampler.start().unwrap();
    table.spawn(5, "late");
    tokio::time::sleep(Duration::from_millis(150)).await;
    sampler.stop().await;

    assert_eq!(
        *seen.lock(),
        vec![(ProcessEventKind::Started, 5, "late".to_string())]
    );

    // Nothing is observed once stopped
    table.spawn(6, "after-stop");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(seen.lock().len(), 1);
}
