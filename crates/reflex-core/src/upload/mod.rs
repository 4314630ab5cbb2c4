//! Photo upload dialogue.
//!
//! A user opens a session, sends up to `capacity` photos (single or as
//! albums) and closes it, or the session auto-closes when it fills up. Every
//! accepted photo is persisted to the profile API before it counts.

pub mod store;

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    domain::UserId,
    locks::UserLocks,
    ports::{MediaResolver, ProfileApi},
    Result,
};

pub use store::{InMemorySessionStore, SessionStore, UploadMode, UploadSession};

/// Hard limit of images on a profile.
pub const MAX_IMAGES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// `existing` images are already on the profile; `capacity` more fit.
    Started { existing: usize, capacity: usize },
    AlreadyFull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageOutcome {
    /// Persisted; `count` images in the session now.
    Accepted { count: usize },
    CapacityExceeded,
    /// Resolving or persisting the image failed; the session is unchanged.
    CommitFailed,
    NoSession,
}

/// Result of handling one photo batch (an album or a lone photo).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<ImageOutcome>,
    /// Images in the session after the batch.
    pub count: usize,
    pub capacity: usize,
    /// The batch filled the session and closed it.
    pub finished: bool,
}

impl BatchReport {
    fn no_session(len: usize) -> Self {
        Self {
            outcomes: vec![ImageOutcome::NoSession; len],
            count: 0,
            capacity: 0,
            finished: false,
        }
    }

    pub fn had_session(&self) -> bool {
        !self
            .outcomes
            .iter()
            .all(|o| *o == ImageOutcome::NoSession)
    }

    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ImageOutcome::Accepted { .. }))
            .count()
    }

    pub fn any_failed(&self) -> bool {
        self.outcomes.contains(&ImageOutcome::CommitFailed)
    }

    pub fn hit_limit(&self) -> bool {
        self.outcomes.contains(&ImageOutcome::CapacityExceeded)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishOutcome {
    Finished { count: usize },
    NothingUploaded,
    NoSession,
}

pub struct UploadFlow {
    profiles: Arc<dyn ProfileApi>,
    resolver: Arc<dyn MediaResolver>,
    store: Arc<dyn SessionStore>,
    locks: UserLocks,
    idle_ttl: Duration,
}

impl UploadFlow {
    pub fn new(
        profiles: Arc<dyn ProfileApi>,
        resolver: Arc<dyn MediaResolver>,
        store: Arc<dyn SessionStore>,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            profiles,
            resolver,
            store,
            locks: UserLocks::default(),
            idle_ttl,
        }
    }

    /// Number of images currently on the user's profile. Lookup failures
    /// count as an empty profile.
    pub async fn existing_images(&self, user: UserId) -> usize {
        match self.profiles.profile(user).await {
            Ok(Some(p)) => p.images.len(),
            Ok(None) => 0,
            Err(e) => {
                warn!(user = user.0, error = %e, "profile lookup failed");
                0
            }
        }
    }

    /// Open (or reopen) an upload session sized to the free profile slots.
    pub async fn start(&self, user: UserId) -> StartOutcome {
        let existing = self.existing_images(user).await;
        if existing >= MAX_IMAGES {
            return StartOutcome::AlreadyFull;
        }
        let capacity = MAX_IMAGES - existing;

        let _guard = self.locks.lock(&user).await;
        self.store
            .put(user, UploadSession::new(capacity, Instant::now()))
            .await;
        info!(user = user.0, existing, capacity, "upload session started");
        StartOutcome::Started { existing, capacity }
    }

    /// Live session of the user, evicting it first if it went idle.
    async fn live_session(&self, user: UserId) -> Option<UploadSession> {
        let session = self.store.get(user).await?;
        if session.is_idle(Instant::now(), self.idle_ttl) {
            self.store.remove(user).await;
            info!(user = user.0, "upload session expired");
            return None;
        }
        Some(session)
    }

    pub async fn has_session(&self, user: UserId) -> bool {
        let _guard = self.locks.lock(&user).await;
        self.live_session(user).await.is_some()
    }

    /// Handle a batch of photos in arrival order.
    ///
    /// Photos past the session capacity are rejected individually; when the
    /// batch fills the session, it is closed after the whole batch is handled.
    pub async fn submit_batch(&self, user: UserId, file_ids: Vec<String>) -> BatchReport {
        let _guard = self.locks.lock(&user).await;
        let Some(mut session) = self.live_session(user).await else {
            debug!(user = user.0, photos = file_ids.len(), "photos without session");
            return BatchReport::no_session(file_ids.len());
        };

        let mut outcomes = Vec::with_capacity(file_ids.len());
        for file_id in &file_ids {
            if session.is_full() {
                outcomes.push(ImageOutcome::CapacityExceeded);
                continue;
            }
            match self.commit(user, file_id).await {
                Ok(url) => {
                    session.images.push(url);
                    outcomes.push(ImageOutcome::Accepted {
                        count: session.images.len(),
                    });
                }
                Err(e) => {
                    warn!(user = user.0, file_id = %file_id, error = %e, "image commit failed");
                    outcomes.push(ImageOutcome::CommitFailed);
                }
            }
        }
        session.last_activity = Instant::now();

        let count = session.images.len();
        let capacity = session.capacity;
        let finished = session.is_full();
        if finished {
            self.store.remove(user).await;
            info!(user = user.0, count, "upload session filled");
        } else {
            self.store.put(user, session).await;
        }

        BatchReport {
            outcomes,
            count,
            capacity,
            finished,
        }
    }

    pub async fn submit_image(&self, user: UserId, file_id: String) -> BatchReport {
        self.submit_batch(user, vec![file_id]).await
    }

    async fn commit(&self, user: UserId, file_id: &str) -> Result<String> {
        let url = self.resolver.resolve_image_url(file_id).await?;
        self.profiles.add_media(user, &url).await?;
        Ok(url)
    }

    /// Close the session. Refused while nothing has been uploaded.
    pub async fn finish(&self, user: UserId) -> FinishOutcome {
        let _guard = self.locks.lock(&user).await;
        let Some(session) = self.live_session(user).await else {
            return FinishOutcome::NoSession;
        };
        if session.images.is_empty() {
            return FinishOutcome::NothingUploaded;
        }
        self.store.remove(user).await;
        let count = session.images.len();
        info!(user = user.0, count, "upload session finished");
        FinishOutcome::Finished { count }
    }

    /// Drop the session without finishing; `true` if one existed.
    pub async fn cancel(&self, user: UserId) -> bool {
        let _guard = self.locks.lock(&user).await;
        self.store.remove(user).await.is_some()
    }

    /// Evict idle sessions and unused user locks.
    pub async fn sweep_idle(&self) -> usize {
        let evicted = self
            .store
            .remove_idle(Instant::now(), self.idle_ttl)
            .await;
        self.locks.prune().await;
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted idle upload sessions");
        }
        evicted.len()
    }

    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let flow = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        flow.sweep_idle().await;
                    }
                }
            }
            debug!("upload sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{file_url, FakeProfileApi, FakeResolver};

    const USER: UserId = UserId(42);
    const TTL: Duration = Duration::from_secs(30 * 60);

    fn flow_with(profiles: Arc<FakeProfileApi>) -> UploadFlow {
        UploadFlow::new(
            profiles,
            Arc::new(FakeResolver),
            Arc::new(InMemorySessionStore::default()),
            TTL,
        )
    }

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[tokio::test]
    async fn accepted_photo_is_persisted_and_counted() {
        let api = Arc::new(FakeProfileApi::default());
        let flow = flow_with(api.clone());

        assert_eq!(
            flow.start(USER).await,
            StartOutcome::Started {
                existing: 0,
                capacity: 5
            }
        );
        let report = flow.submit_image(USER, "p1".into()).await;
        assert_eq!(report.outcomes, vec![ImageOutcome::Accepted { count: 1 }]);
        assert_eq!(report.count, 1);
        assert!(!report.finished);
        assert_eq!(api.uploaded(), vec![(42, file_url("p1"))]);
        assert!(flow.has_session(USER).await);
    }

    #[tokio::test]
    async fn fifth_photo_closes_the_session() {
        let api = Arc::new(FakeProfileApi::default());
        let flow = flow_with(api.clone());
        flow.start(USER).await;

        for (i, id) in ids("p", 4).into_iter().enumerate() {
            let r = flow.submit_image(USER, id).await;
            assert_eq!(r.count, i + 1);
            assert!(!r.finished);
        }
        let last = flow.submit_image(USER, "p5".into()).await;
        assert!(last.finished);
        assert_eq!(last.count, 5);
        assert!(!flow.has_session(USER).await);

        let after = flow.submit_image(USER, "p6".into()).await;
        assert_eq!(after.outcomes, vec![ImageOutcome::NoSession]);
        assert_eq!(api.uploaded().len(), 5);
    }

    #[tokio::test]
    async fn oversized_album_is_cut_at_capacity() {
        let api = Arc::new(FakeProfileApi::default());
        let flow = flow_with(api.clone());
        flow.start(USER).await;

        let report = flow.submit_batch(USER, ids("a", 7)).await;
        assert_eq!(report.accepted(), 5);
        assert_eq!(
            &report.outcomes[5..],
            &[ImageOutcome::CapacityExceeded, ImageOutcome::CapacityExceeded]
        );
        assert!(report.hit_limit());
        assert!(report.finished);
        assert_eq!(api.uploaded().len(), 5);
    }

    #[tokio::test]
    async fn capacity_accounts_for_existing_profile_images() {
        let api = Arc::new(FakeProfileApi::with_images(42, 3));
        let flow = flow_with(api.clone());

        assert_eq!(
            flow.start(USER).await,
            StartOutcome::Started {
                existing: 3,
                capacity: 2
            }
        );
        let report = flow.submit_batch(USER, ids("p", 3)).await;
        assert_eq!(report.accepted(), 2);
        assert_eq!(report.capacity, 2);
        assert!(report.finished);
        assert_eq!(api.uploaded().len(), 2);
    }

    #[tokio::test]
    async fn full_profile_cannot_start() {
        let flow = flow_with(Arc::new(FakeProfileApi::with_images(42, 5)));
        assert_eq!(flow.start(USER).await, StartOutcome::AlreadyFull);
        assert!(!flow.has_session(USER).await);
    }

    #[tokio::test]
    async fn finish_requires_at_least_one_image() {
        let flow = flow_with(Arc::new(FakeProfileApi::default()));
        assert_eq!(flow.finish(USER).await, FinishOutcome::NoSession);

        flow.start(USER).await;
        assert_eq!(flow.finish(USER).await, FinishOutcome::NothingUploaded);
        assert!(flow.has_session(USER).await);

        flow.submit_image(USER, "p1".into()).await;
        assert_eq!(flow.finish(USER).await, FinishOutcome::Finished { count: 1 });
        assert!(!flow.has_session(USER).await);
    }

    #[tokio::test]
    async fn photos_without_session_are_ignored() {
        let api = Arc::new(FakeProfileApi::default());
        let flow = flow_with(api.clone());
        let report = flow.submit_batch(USER, ids("p", 2)).await;
        assert!(!report.had_session());
        assert!(api.uploaded().is_empty());
    }

    #[tokio::test]
    async fn failed_commit_does_not_count() {
        let api = Arc::new(FakeProfileApi::default());
        api.failing_urls
            .lock()
            .unwrap()
            .insert(file_url("rejected"));
        let flow = flow_with(api.clone());
        flow.start(USER).await;

        let report = flow
            .submit_batch(
                USER,
                vec!["broken-1".into(), "rejected".into(), "ok".into()],
            )
            .await;
        assert_eq!(
            report.outcomes,
            vec![
                ImageOutcome::CommitFailed,
                ImageOutcome::CommitFailed,
                ImageOutcome::Accepted { count: 1 },
            ]
        );
        assert!(report.any_failed());
        assert_eq!(report.count, 1);
        assert!(flow.has_session(USER).await);
    }

    #[tokio::test]
    async fn session_never_exceeds_capacity() {
        let api = Arc::new(FakeProfileApi::with_images(42, 1));
        let flow = flow_with(api.clone());
        for round in 0..4 {
            flow.start(USER).await;
            let batch = ids(&format!("r{round}-"), round + 2);
            let report = flow.submit_batch(USER, batch).await;
            assert!(report.count <= report.capacity);
            assert!(report.capacity <= MAX_IMAGES - 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let flow = flow_with(Arc::new(FakeProfileApi::default()));
        flow.start(USER).await;
        flow.start(UserId(7)).await;

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        flow.submit_image(UserId(7), "p1".into()).await;

        tokio::time::advance(Duration::from_secs(11 * 60)).await;
        assert_eq!(flow.sweep_idle().await, 1);
        assert!(!flow.has_session(USER).await);
        assert!(flow.has_session(UserId(7)).await);

        // Lazy expiry on access, without a sweep.
        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        assert!(!flow.has_session(UserId(7)).await);
    }
}
