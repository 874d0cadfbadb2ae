/*!
 * Event System
 * Explicit publish/subscribe with per-kind listener handles
 */

use super::snapshot::{ProcessSnapshotEntry, SnapshotDiff};
use crate::core::sync::RcuCell;
use crate::core::types::Pid;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered listener registry for one event kind
///
/// Listeners run synchronously on the publisher's context in registration
/// order. The listener list is copy-on-write, so subscribing or
/// unsubscribing from inside a listener is safe and takes effect from the
/// next publish.
pub struct EventBus<T> {
    listeners: RcuCell<Vec<(SubscriptionId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            listeners: RcuCell::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener<T> = Arc::new(listener);
        self.listeners.update(|current| {
            let mut next = current.clone();
            next.push((id, Arc::clone(&listener)));
            next
        });
        id
    }

    /// Returns false when the handle was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.listeners.update(|current| {
            let next: Vec<_> = current
                .iter()
                .filter(|(sid, _)| *sid != id)
                .cloned()
                .collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    /// Deliver `event` to every listener; returns how many were notified
    pub fn publish(&self, event: &T) -> usize {
        let listeners = self.listeners.load();
        for (_, listener) in listeners.iter() {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessEventKind {
    Started,
    Ended,
    AffinityChanged,
}

/// The three process event streams
#[derive(Default)]
pub struct ProcessEvents {
    pub started: EventBus<ProcessSnapshotEntry>,
    pub ended: EventBus<ProcessSnapshotEntry>,
    pub affinity_changed: EventBus<ProcessSnapshotEntry>,
}

/// Handles for a listener registered on all three streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSubscription {
    pub started: SubscriptionId,
    pub ended: SubscriptionId,
    pub affinity_changed: SubscriptionId,
}

impl ProcessEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bus(&self, kind: ProcessEventKind) -> &EventBus<ProcessSnapshotEntry> {
        match kind {
            ProcessEventKind::Started => &self.started,
            ProcessEventKind::Ended => &self.ended,
            ProcessEventKind::AffinityChanged => &self.affinity_changed,
        }
    }

    pub fn publish(&self, kind: ProcessEventKind, entry: &ProcessSnapshotEntry) -> usize {
        self.bus(kind).publish(entry)
    }

    /// Publish a diff: started, then ended, then affinity-changed
    pub fn publish_diff(&self, diff: &SnapshotDiff) {
        for entry in &diff.started {
            self.started.publish(entry);
        }
        for entry in &diff.ended {
            self.ended.publish(entry);
        }
        for entry in &diff.affinity_changed {
            self.affinity_changed.publish(entry);
        }
    }

    /// Register one listener on all three streams
    pub fn subscribe_all<F>(&self, listener: F) -> ProcessSubscription
    where
        F: Fn(ProcessEventKind, &ProcessSnapshotEntry) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let on_started = Arc::clone(&listener);
        let on_ended = Arc::clone(&listener);
        ProcessSubscription {
            started: self
                .started
                .subscribe(move |e| on_started(ProcessEventKind::Started, e)),
            ended: self
                .ended
                .subscribe(move |e| on_ended(ProcessEventKind::Ended, e)),
            affinity_changed: self
                .affinity_changed
                .subscribe(move |e| listener(ProcessEventKind::AffinityChanged, e)),
        }
    }

    pub fn unsubscribe_all(&self, subscription: ProcessSubscription) -> bool {
        let a = self.started.unsubscribe(subscription.started);
        let b = self.ended.unsubscribe(subscription.ended);
        let c = self.affinity_changed.unsubscribe(subscription.affinity_changed);
        a && b && c
    }
}

/// Source of process lifecycle events
///
/// The polling sampler is one implementation; anything that can produce the
/// three streams can drive the rule engine.
pub trait ProcessEventSource: Send + Sync {
    fn events(&self) -> &ProcessEvents;
}

/// Outcome of one rule (or default CCD) application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApplied {
    pub process_name: String,
    pub ccd_name: String,
    /// Set for event-driven writes to a single process
    pub pid: Option<Pid>,
    pub success: bool,
    pub message: String,
}
