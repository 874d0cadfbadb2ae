/*!
 * Debouncer
 * Single-slot coalescing of bursty notifications with a staleness ceiling
 */

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// What a call to [`Debouncer::trigger`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// A delay timer was armed; the action runs when it expires
    Scheduled,
    /// A timer was already armed; this call was absorbed
    Coalesced,
    /// The staleness ceiling was exceeded; the action ran inline
    RanImmediately,
}

struct State {
    pending: Option<JoinHandle<()>>,
    /// Bumped whenever a timer is armed or cancelled; a timer only fires if
    /// it still owns the current generation
    generation: u64,
    last_run: Instant,
}

impl State {
    fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

struct Inner {
    action: Box<dyn Fn() + Send + Sync>,
    delay: Duration,
    max_staleness: Duration,
    state: Mutex<State>,
    runs: AtomicU64,
}

impl Inner {
    fn run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        (self.action)();
    }

    /// Timer expiry; returns false if the timer was superseded
    fn fire(&self, generation: u64) -> bool {
        {
            let mut state = self.state.lock();
            if state.generation != generation || state.pending.is_none() {
                trace!(generation, "stale debounce timer ignored");
                return false;
            }
            state.pending = None;
            state.last_run = Instant::now();
        }
        self.run();
        true
    }
}

/// Coalesces bursts of `trigger()` calls into one deferred action run
///
/// Only one timer is ever armed. While armed, further triggers are no-ops.
/// If the action has not run for longer than `max_staleness`, a trigger runs
/// it on the caller's context instead of arming the timer.
pub struct Debouncer {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl Debouncer {
    /// Create a debouncer bound to the current Tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime context.
    pub fn new<F>(action: F, delay: Duration, max_staleness: Duration) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_handle(Handle::current(), action, delay, max_staleness)
    }

    /// Create a debouncer that arms its timers on `runtime`
    pub fn with_handle<F>(runtime: Handle, action: F, delay: Duration, max_staleness: Duration) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                action: Box::new(action),
                delay,
                max_staleness,
                state: Mutex::new(State {
                    pending: None,
                    generation: 0,
                    last_run: Instant::now(),
                }),
                runs: AtomicU64::new(0),
            }),
            runtime,
        }
    }

    /// Request a run of the action
    pub fn trigger(&self) -> DebounceOutcome {
        let mut state = self.inner.state.lock();

        if state.pending.is_some() {
            trace!("debounce trigger coalesced");
            return DebounceOutcome::Coalesced;
        }

        if state.last_run.elapsed() >= self.inner.max_staleness {
            state.last_run = Instant::now();
            drop(state);
            trace!("staleness ceiling exceeded, running inline");
            self.inner.run();
            return DebounceOutcome::RanImmediately;
        }

        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        state.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(inner.delay).await;
            inner.fire(generation);
        }));
        DebounceOutcome::Scheduled
    }

    /// Cancel any armed timer and run the action now
    pub fn flush(&self) {
        {
            let mut state = self.inner.state.lock();
            state.cancel();
            state.last_run = Instant::now();
        }
        self.inner.run();
    }

    /// Whether a timer is currently armed
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Number of times the action has run
    pub fn runs(&self) -> u64 {
        self.inner.runs.load(Ordering::Relaxed)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.inner.state.lock().cancel();
    }
}
