//! Serialized, evenly spaced dispatch of status text.
//!
//! [`SearchRequestQueue::enqueue`] appends to a FIFO and starts a drain
//! task if none is running. The drain task pops one item at a time,
//! broadcasts it as a [`StatusEvent`], then sleeps for the configured
//! delay before looking at the next item. Only one drain task exists per
//! queue; enqueuing while it runs just extends its work.
//!
//! Must be used from within a tokio runtime.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

/// A status text update for the search UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub text: String,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    draining: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    delay: Duration,
    events: broadcast::Sender<StatusEvent>,
    idle: Notify,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// FIFO of status texts dispatched at most once per `delay`.
#[derive(Clone)]
pub struct SearchRequestQueue {
    inner: Arc<QueueInner>,
}

impl SearchRequestQueue {
    pub fn new(delay: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                delay,
                events,
                idle: Notify::new(),
            }),
        }
    }

    /// Register an observer. It receives every event dispatched after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.events.subscribe()
    }

    /// Append `text`; start draining if the queue was idle.
    pub fn enqueue(&self, text: impl Into<String>) {
        let start = {
            let mut state = self.inner.lock();
            state.pending.push_back(text.into());
            !std::mem::replace(&mut state.draining, true)
        };
        if start {
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    /// Items waiting to be dispatched.
    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every enqueued item has been dispatched.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if !self.is_draining() {
                return;
            }
            notified.await;
        }
    }
}

async fn drain(inner: Arc<QueueInner>) {
    loop {
        let next = {
            let mut state = inner.lock();
            match state.pending.pop_front() {
                Some(text) => text,
                None => {
                    state.draining = false;
                    break;
                }
            }
        };

        debug!(text = %next, "dispatching status event");
        // No observers is fine.
        let _ = inner.events.send(StatusEvent { text: next });
        tokio::time::sleep(inner.delay).await;
    }
    inner.idle.notify_waiters();
}
