//! Per-key async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Prune dead entries once the map grows past this
const PRUNE_THRESHOLD: usize = 1024;

/// Hands out one async mutex per key; entries vanish when no guard holds them.
///
/// Serializes refreshes of one identity, link decisions for one
/// `(provider, subject)` and unlinks for one user.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            if locks.len() >= PRUNE_THRESHOLD {
                locks.retain(|_, weak| weak.strong_count() > 0);
            }

            match locks.get(key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let created = Arc::new(AsyncMutex::new(()));
                    locks.insert(key.to_string(), Arc::downgrade(&created));
                    created
                }
            }
        };

        mutex.lock_owned().await
    }

    /// Number of tracked keys, including dead ones not yet pruned
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether no key is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock key for a provider subject
pub(crate) fn subject_key(provider: &str, subject: &str) -> String {
    format!("subject:{}:{}", provider, subject)
}

/// Lock key for a linked identity
pub(crate) fn identity_key(identity_id: &uuid::Uuid) -> String {
    format!("identity:{}", identity_id)
}

/// Lock key for a local user
pub(crate) fn user_key(user_id: &uuid::Uuid) -> String {
    format!("user:{}", user_id)
}
