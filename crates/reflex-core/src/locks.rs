use std::{collections::HashMap, hash::Hash, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::UserId;

/// Lazily created async locks, one per key.
///
/// Handlers for the same user run on different runtime threads; holding the
/// user's guard keeps their session operations from interleaving.
pub struct KeyedLocks<K> {
    inner: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

pub type UserLocks = KeyedLocks<UserId>;

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop lock entries nobody is holding or waiting on.
    pub async fn prune(&self) -> usize {
        let mut map = self.inner.lock().await;
        let before = map.len();
        map.retain(|_, l| Arc::strong_count(l) > 1);
        before - map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive_and_prune_drops_idle_entries() {
        let locks = UserLocks::default();
        let guard = locks.lock(&UserId(1)).await;

        // A different key must not block.
        let other = locks.lock(&UserId(2)).await;
        drop(other);

        assert_eq!(locks.prune().await, 1); // user 2 is idle, user 1 is held
        drop(guard);
        assert_eq!(locks.prune().await, 1);
    }
}
