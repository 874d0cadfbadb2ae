/*!
 * Debouncer Tests
 */

use ccd_affinity::{DebounceOutcome, Debouncer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_burst_runs_once_after_delay() {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let debouncer = Debouncer::new(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(1000),
        Duration::from_secs(60),
    );

    assert_eq!(debouncer.trigger(), DebounceOutcome::Scheduled);
    for _ in 0..10 {
        assert_eq!(debouncer.trigger(), DebounceOutcome::Coalesced);
    }

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!debouncer.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_stale_trigger_runs_inline() {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let debouncer = Debouncer::new(
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(1000),
        Duration::from_millis(5000),
    );

    tokio::time::sleep(Duration::from_millis(6000)).await;
    assert_eq!(debouncer.trigger(), DebounceOutcome::RanImmediately);
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Freshly run, so the next trigger is deferred again
    assert_eq!(debouncer.trigger(), DebounceOutcome::Scheduled);
    assert_eq!(debouncer.runs(), 1);
}
