/*!
 * Process Sampler
 *
 * Polls the process table on a fixed interval and turns consecutive
 * snapshots into started / ended / affinity-changed events. Runs as an
 * independent Tokio task controlled over a command channel.
 */

use super::events::{ProcessEventSource, ProcessEvents};
use super::snapshot::{ProcessSnapshot, SnapshotDiff};
use super::tracer::OperationSpan;
use crate::affinity::ProcessTable;
use crate::core::errors::AffinityResult;
use crate::core::limits::SLOW_TICK_THRESHOLD;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Control messages for the sampler task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerCommand {
    /// Sample immediately without waiting for the next tick
    Trigger,
    /// Stop the sampling loop
    Shutdown,
}

/// Sampler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Sampling,
}

/// Handle to the running sampler loop
struct SamplerTask {
    command_tx: mpsc::UnboundedSender<SamplerCommand>,
    /// Owned by this loop alone, so a restart never revives a stopping loop
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SamplerTask {
    fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.command_tx.send(SamplerCommand::Shutdown);
    }
}

/// Periodic process table sampler
///
/// Ticks never overlap: one tick's capture, diff, publish and swap complete
/// before the next begins. Listeners run on the sampler's context.
pub struct ProcessSampler {
    table: Arc<dyn ProcessTable>,
    interval: Duration,
    events: ProcessEvents,
    previous: Mutex<ProcessSnapshot>,
    tick_lock: Mutex<()>,
    active: AtomicBool,
    task: Mutex<Option<SamplerTask>>,
    ticks: AtomicU64,
}

impl ProcessSampler {
    pub fn new(table: Arc<dyn ProcessTable>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            table,
            interval,
            events: ProcessEvents::new(),
            previous: Mutex::new(ProcessSnapshot::new()),
            tick_lock: Mutex::new(()),
            active: AtomicBool::new(false),
            task: Mutex::new(None),
            ticks: AtomicU64::new(0),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SamplerState {
        if self.active.load(Ordering::Acquire) {
            SamplerState::Sampling
        } else {
            SamplerState::Idle
        }
    }

    /// Completed ticks since construction
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Copy of the most recent snapshot
    pub fn last_snapshot(&self) -> ProcessSnapshot {
        self.previous.lock().clone()
    }

    /// Replace the comparison snapshot without emitting events
    pub fn take_baseline(&self) -> AffinityResult<usize> {
        let _tick = self.tick_lock.lock();
        let baseline = ProcessSnapshot::capture(self.table.as_ref(), &self.previous.lock())?;
        let count = baseline.len();
        *self.previous.lock() = baseline;
        Ok(count)
    }

    /// Transition Idle -> Sampling
    ///
    /// Takes a baseline first so the first tick does not report every
    /// running process as started. Returns false if already sampling.
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> AffinityResult<bool> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Ok(false);
        }

        let processes = self.take_baseline()?;
        self.active.store(true, Ordering::Release);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_sampler_loop(
            Arc::downgrade(self),
            self.interval,
            command_rx,
            Arc::clone(&stop),
        ));
        *task = Some(SamplerTask {
            command_tx,
            stop,
            handle,
        });

        info!(
            interval_ms = self.interval.as_millis() as u64,
            baseline = processes,
            "process sampler started"
        );
        Ok(true)
    }

    /// Request an immediate sample from the running loop
    pub fn trigger(&self) {
        if let Some(task) = self.task.lock().as_ref() {
            let _ = task.command_tx.send(SamplerCommand::Trigger);
        }
    }

    /// Transition Sampling -> Idle without waiting for the loop to exit
    ///
    /// No tick starts after this returns; a tick already running finishes.
    pub fn request_stop(&self) -> bool {
        self.active.store(false, Ordering::Release);
        match self.task.lock().take() {
            Some(task) => {
                task.shutdown();
                true
            }
            None => false,
        }
    }

    /// Transition Sampling -> Idle and wait for the loop to exit
    ///
    /// Once this returns no further events are published by the loop.
    pub async fn stop(&self) {
        self.active.store(false, Ordering::Release);
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.shutdown();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "process sampler shutdown error");
            } else {
                info!("process sampler stopped");
            }
        }
    }

    /// Run one sampling pass: capture, diff, publish, swap
    ///
    /// An enumeration failure keeps the previous snapshot and publishes
    /// nothing, so a transient failure never looks like every process ended.
    pub fn tick(&self) -> AffinityResult<SnapshotDiff> {
        let _tick = self.tick_lock.lock();
        let span = OperationSpan::with_threshold("sampler_tick", SLOW_TICK_THRESHOLD);

        let next = ProcessSnapshot::capture(self.table.as_ref(), &self.previous.lock());
        let next = match next {
            Ok(snapshot) => snapshot,
            Err(e) => {
                span.record_error(&e.to_string());
                warn!(error = %e, "process snapshot failed, keeping previous");
                return Err(e);
            }
        };

        let diff = {
            let mut previous = self.previous.lock();
            let diff = previous.diff(&next);
            *previous = next;
            diff
        };

        self.ticks.fetch_add(1, Ordering::Relaxed);
        span.record_items_processed(diff.len());
        if !diff.is_empty() {
            debug!(
                started = diff.started.len(),
                ended = diff.ended.len(),
                affinity_changed = diff.affinity_changed.len(),
                "process table changed"
            );
        }

        self.events.publish_diff(&diff);
        Ok(diff)
    }
}

impl ProcessEventSource for ProcessSampler {
    fn events(&self) -> &ProcessEvents {
        &self.events
    }
}

impl Drop for ProcessSampler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.shutdown();
        }
    }
}

/// Sampler loop; holds only a weak reference so dropping the sampler ends it
///
/// The tick body reads `/proc` and may write affinities, so it runs on the
/// blocking pool. The loop awaits it, which keeps ticks from overlapping.
async fn run_sampler_loop(
    sampler: Weak<ProcessSampler>,
    period: Duration,
    mut command_rx: mpsc::UnboundedReceiver<SamplerCommand>,
    stop: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            cmd = command_rx.recv() => match cmd {
                Some(SamplerCommand::Trigger) => {}
                Some(SamplerCommand::Shutdown) | None => break,
            },
        }

        if stop.load(Ordering::Acquire) {
            break;
        }
        let Some(sampler) = sampler.upgrade() else {
            break;
        };
        // Errors are logged inside tick; the next tick retries
        if let Err(e) = tokio::task::spawn_blocking(move || sampler.tick()).await {
            warn!(error = %e, "sampler tick panicked");
        }
    }

    debug!("process sampler loop exited");
}
