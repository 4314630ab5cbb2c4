//! Ad cadence gate: every Nth qualifying action of a user triggers an ad.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::UserId;

pub const DEFAULT_CADENCE: u64 = 5;

/// Storage for per-user action counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment and return the new value. Counters never decrease.
    async fn increment(&self, user: UserId) -> u64;

    async fn get(&self, user: UserId) -> u64;
}

/// Process-lifetime counters; a restart resets everyone to zero.
#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<UserId, u64>>,
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, user: UserId) -> u64 {
        let mut map = self.counters.lock().await;
        let c = map.entry(user).or_insert(0);
        *c = c.saturating_add(1);
        *c
    }

    async fn get(&self, user: UserId) -> u64 {
        self.counters.lock().await.get(&user).copied().unwrap_or(0)
    }
}

pub struct CadenceGate {
    every: u64,
    counters: Arc<dyn CounterStore>,
}

impl CadenceGate {
    pub fn new(every: u64, counters: Arc<dyn CounterStore>) -> Self {
        Self {
            every: every.max(1),
            counters,
        }
    }

    pub fn in_memory(every: u64) -> Self {
        Self::new(every, Arc::new(InMemoryCounterStore::default()))
    }

    /// Count one qualifying action; `true` when an ad is due.
    pub async fn should_show_ad(&self, user: UserId) -> bool {
        let n = self.counters.increment(user).await;
        n % self.every == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_on_every_fifth_action() {
        let gate = CadenceGate::in_memory(DEFAULT_CADENCE);
        let mut fired = Vec::new();
        for call in 1..=15u64 {
            if gate.should_show_ad(UserId(1)).await {
                fired.push(call);
            }
        }
        assert_eq!(fired, vec![5, 10, 15]);
    }

    #[tokio::test]
    async fn counters_are_per_user() {
        let store = Arc::new(InMemoryCounterStore::default());
        let gate = CadenceGate::new(5, store.clone());
        for _ in 0..4 {
            assert!(!gate.should_show_ad(UserId(1)).await);
        }
        // A different user starts from zero.
        assert!(!gate.should_show_ad(UserId(2)).await);
        assert!(gate.should_show_ad(UserId(1)).await);

        assert_eq!(store.get(UserId(1)).await, 5);
        assert_eq!(store.get(UserId(2)).await, 1);
        assert_eq!(store.get(UserId(3)).await, 0);
    }

    #[tokio::test]
    async fn zero_cadence_is_clamped_to_every_action() {
        let gate = CadenceGate::in_memory(0);
        assert!(gate.should_show_ad(UserId(9)).await);
        assert!(gate.should_show_ad(UserId(9)).await);
    }
}
