//! Process-scoped idempotency cache.
//!
//! Keys are `(operation, caller key)`. Check-then-act happens under one lock, so two
//! concurrent invocations with the same key never both execute. Entries live for the
//! lifetime of the process; only successful outcomes are retained.

use crate::envelope::Outcome;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

type Key = (String, String);

enum Slot {
    /// An invocation holds the key. The receiver resolves when its claim ends.
    InFlight(watch::Receiver<()>),
    Done(Outcome),
}

/// Result of trying to claim a key.
pub enum Claim {
    /// First use: execute, then [`ClaimGuard::complete`] on success.
    Execute(ClaimGuard),
    /// Idempotent operation whose key already produced an outcome.
    Replay(Outcome),
    /// Idempotent operation whose key is held by a running invocation.
    Wait(watch::Receiver<()>),
    /// Non-idempotent operation whose key was already used.
    Duplicate,
}

#[derive(Clone, Default)]
pub struct IdempotencyCache {
    entries: Arc<Mutex<HashMap<Key, Slot>>>,
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, operation: &str, key: &str, idempotent: bool) -> Claim {
        let cache_key = (operation.to_string(), key.to_string());
        let mut entries = self.entries.lock();
        match entries.get(&cache_key) {
            Some(_) if !idempotent => Claim::Duplicate,
            Some(Slot::Done(outcome)) => Claim::Replay(outcome.clone()),
            Some(Slot::InFlight(receiver)) => Claim::Wait(receiver.clone()),
            None => {
                let (sender, receiver) = watch::channel(());
                entries.insert(cache_key.clone(), Slot::InFlight(receiver));
                Claim::Execute(ClaimGuard {
                    entries: Arc::clone(&self.entries),
                    key: cache_key,
                    _release: sender,
                    completed: false,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for IdempotencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// Exclusive hold on a key. Dropping it without completing releases the key.
pub struct ClaimGuard {
    entries: Arc<Mutex<HashMap<Key, Slot>>>,
    key: Key,
    // Dropped after the slot is updated, which wakes every waiter.
    _release: watch::Sender<()>,
    completed: bool,
}

impl ClaimGuard {
    /// Store the outcome for replay.
    pub fn complete(mut self, outcome: Outcome) {
        self.entries
            .lock()
            .insert(self.key.clone(), Slot::Done(outcome));
        self.completed = true;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.entries.lock().remove(&self.key);
        }
    }
}

/// Block until the holder of a key finishes (completes or releases).
pub async fn wait_for_release(mut receiver: watch::Receiver<()>) {
    // `changed` errors once the sender is gone, which is the only event we wait for.
    while receiver.changed().await.is_ok() {}
}
