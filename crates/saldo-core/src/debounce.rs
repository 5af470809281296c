//! Keyed, cancellable delayed tasks
//!
//! Scheduling work for a key aborts whatever was still pending for that key,
//! so a burst of calls collapses into the last one once the delay elapses
//! without another call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    next_generation: u64,
    pending: HashMap<String, Pending>,
}

/// Per-key debouncer
///
/// Each key has at most one pending task. The delayed future runs on the tokio
/// runtime; once the delay has elapsed the task is detached from the slot, so
/// a later `schedule` or `cancel` never interrupts work that already started.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    slots: Arc<Mutex<Slots>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` after the delay unless `key` is rescheduled or cancelled first
    pub fn schedule<F>(&self, key: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.next_generation += 1;
        let generation = slots.next_generation;

        let delay = self.delay;
        let owned_key = key.to_string();
        let registry = Arc::clone(&self.slots);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Release the slot before running so the task can't be aborted mid-flight
            {
                let mut slots = registry.lock().unwrap_or_else(PoisonError::into_inner);
                match slots.pending.get(&owned_key) {
                    Some(p) if p.generation == generation => {
                        slots.pending.remove(&owned_key);
                    }
                    _ => return,
                }
            }

            task.await;
        });

        if let Some(previous) = slots.pending.insert(
            key.to_string(),
            Pending {
                generation,
                handle,
            },
        ) {
            debug!(key = %key, "Superseding pending debounced task");
            previous.handle.abort();
        }
    }

    /// Cancel the pending task for `key`; returns whether one was pending
    pub fn cancel(&self, key: &str) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.pending.remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending task
    pub fn cancel_all(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, pending) in slots.pending.drain() {
            pending.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.pending.contains_key(key)
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
