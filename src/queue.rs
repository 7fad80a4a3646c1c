//! Per-key serialized job queue.
//!
//! For a fixed key, tasks run strictly in submission order and never overlap;
//! tasks under different keys run concurrently without bound. A task that
//! fails or is cancelled never blocks its successors — each task's outcome is
//! reported only to its own caller. Once a key drains, its bookkeeping entry
//! is dropped so the map does not grow with conversation count.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

/// Serializes work per string key by chaining completion signals.
#[derive(Clone, Default)]
pub struct KeyedQueue {
    keys: Arc<Mutex<HashMap<String, KeyState>>>,
}

struct KeyState {
    /// Completion signal of the most recently chained task under this key.
    tail: oneshot::Receiver<()>,
    /// Chained tasks not yet finished, including the one running.
    depth: usize,
}

impl KeyedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain `task` behind all work already submitted for `key`.
    ///
    /// The position in the chain is claimed synchronously, before the
    /// returned future is polled: two calls made in order are executed in
    /// that order even if their futures are awaited later.
    pub fn run<T, F>(&self, key: &str, task: F) -> impl Future<Output = T>
    where
        F: Future<Output = T>,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let predecessor = {
            let mut keys = lock_or_recover(&self.keys);
            match keys.get_mut(key) {
                Some(state) => {
                    state.depth += 1;
                    Some(std::mem::replace(&mut state.tail, done_rx))
                }
                None => {
                    keys.insert(
                        key.to_string(),
                        KeyState {
                            tail: done_rx,
                            depth: 1,
                        },
                    );
                    None
                }
            }
        };

        let guard = ChainGuard {
            key: key.to_string(),
            done_tx: Some(done_tx),
            keys: Arc::clone(&self.keys),
        };

        async move {
            // Completion must be signalled even if this future is dropped
            // mid-task, or every successor under the key would hang.
            let _guard = guard;
            if let Some(prev) = predecessor {
                // A dropped or failed predecessor reads as completed;
                // failures stay isolated to their own caller.
                let _ = prev.await;
            }
            task.await
        }
    }

    /// Number of keys with in-flight or queued work.
    pub fn active_keys(&self) -> usize {
        lock_or_recover(&self.keys).len()
    }
}

/// Signals task completion and trims drained keys, whether the task ran to
/// completion or its future was dropped.
struct ChainGuard {
    key: String,
    done_tx: Option<oneshot::Sender<()>>,
    keys: Arc<Mutex<HashMap<String, KeyState>>>,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        if let Some(done_tx) = self.done_tx.take() {
            let _ = done_tx.send(());
        }
        let mut keys = lock_or_recover(&self.keys);
        if let Some(state) = keys.get_mut(&self.key) {
            state.depth -= 1;
            if state.depth == 0 {
                keys.remove(&self.key);
            }
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
