use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::domain::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadMode {
    Uploading,
}

/// An in-progress photo upload dialogue of one user.
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub mode: UploadMode,
    /// Persisted image URLs in upload order.
    pub images: Vec<String>,
    /// How many images this session may hold (`5 - profile images` at start).
    pub capacity: usize,
    pub last_activity: Instant,
}

impl UploadSession {
    pub fn new(capacity: usize, now: Instant) -> Self {
        Self {
            mode: UploadMode::Uploading,
            images: Vec::new(),
            capacity,
            last_activity: now,
        }
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= self.capacity
    }

    pub fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > ttl
    }
}

/// Storage for upload sessions, keyed by user.
///
/// The in-memory implementation is the only one today; the trait keeps the
/// flow independent of where sessions live.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: UserId) -> Option<UploadSession>;

    /// Insert or replace the user's session.
    async fn put(&self, user: UserId, session: UploadSession);

    async fn remove(&self, user: UserId) -> Option<UploadSession>;

    /// Remove sessions idle for longer than `ttl`, returning their owners.
    async fn remove_idle(&self, now: Instant, ttl: Duration) -> Vec<UserId>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<UserId, UploadSession>>,
}

impl InMemorySessionStore {
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user: UserId) -> Option<UploadSession> {
        self.sessions.lock().await.get(&user).cloned()
    }

    async fn put(&self, user: UserId, session: UploadSession) {
        self.sessions.lock().await.insert(user, session);
    }

    async fn remove(&self, user: UserId) -> Option<UploadSession> {
        self.sessions.lock().await.remove(&user)
    }

    async fn remove_idle(&self, now: Instant, ttl: Duration) -> Vec<UserId> {
        let mut map = self.sessions.lock().await;
        let idle: Vec<UserId> = map
            .iter()
            .filter(|(_, s)| s.is_idle(now, ttl))
            .map(|(u, _)| *u)
            .collect();
        for u in &idle {
            map.remove(u);
        }
        idle
    }
}
