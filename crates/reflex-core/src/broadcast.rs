//! Bulk ad delivery and the daily broadcast job.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use futures::{stream, StreamExt};
use tokio::{
    task::JoinHandle,
    time::{sleep, sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    ads::AdRenderer,
    api::types::UserRecord,
    domain::{ChatId, UserId},
    ports::ProfileApi,
    Result,
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Copy, Debug)]
pub struct BroadcastConfig {
    /// Local wall-clock time of the daily run.
    pub daily_at: NaiveTime,
    /// Pause after each delivery.
    pub throttle: Duration,
    /// Deliveries in flight at once.
    pub concurrency: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            daily_at: NaiveTime::from_hms_opt(15, 0, 0).unwrap_or_default(),
            throttle: Duration::from_millis(100),
            concurrency: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub total: usize,
    pub sent: usize,
    /// No ad was available for the user.
    pub no_ad: usize,
    pub failed: usize,
}

enum Delivery {
    Sent,
    NoAd,
    Failed,
}

/// First occurrence of `at` strictly after `now`, in `now`'s time zone.
///
/// A wall-clock time skipped by a DST jump falls through to the next day.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        if let Some(t) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if t > *now {
                return t;
            }
        }
        match day.checked_add_days(Days::new(1)) {
            Some(d) => day = d,
            None => break,
        }
    }
    now.clone() + chrono::Duration::days(1)
}

#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<BroadcasterInner>,
}

struct BroadcasterInner {
    cfg: BroadcastConfig,
    profiles: Arc<dyn ProfileApi>,
    renderer: Arc<AdRenderer>,
    daily: tokio::sync::Mutex<DailyJob>,
}

#[derive(Default)]
struct DailyJob {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl Broadcaster {
    pub fn new(
        cfg: BroadcastConfig,
        profiles: Arc<dyn ProfileApi>,
        renderer: Arc<AdRenderer>,
    ) -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                cfg,
                profiles,
                renderer,
                daily: tokio::sync::Mutex::new(DailyJob::default()),
            }),
        }
    }

    /// Send one ad to every user. A failing user never stops the run.
    pub async fn broadcast(&self, users: Vec<UserRecord>) -> BroadcastReport {
        let mut report = BroadcastReport {
            total: users.len(),
            ..BroadcastReport::default()
        };
        let limit = self.inner.cfg.concurrency.max(1);
        let deliveries: Vec<Delivery> = stream::iter(users)
            .map(|user| self.deliver(user))
            .buffer_unordered(limit)
            .collect()
            .await;

        for d in deliveries {
            match d {
                Delivery::Sent => report.sent += 1,
                Delivery::NoAd => report.no_ad += 1,
                Delivery::Failed => report.failed += 1,
            }
        }
        report
    }

    async fn deliver(&self, user: UserRecord) -> Delivery {
        let Some(id) = user.telegram_id() else {
            warn!(record = %user.telegram_id, "malformed user record");
            return Delivery::Failed;
        };

        let res = self.inner.renderer.render_ad(ChatId(id), UserId(id)).await;
        sleep(self.inner.cfg.throttle).await;
        match res {
            Ok(true) => Delivery::Sent,
            Ok(false) => Delivery::NoAd,
            Err(e) => {
                warn!(user = id, error = %e, "broadcast delivery failed");
                Delivery::Failed
            }
        }
    }

    /// Broadcast to the full registered population.
    pub async fn broadcast_all(&self) -> Result<BroadcastReport> {
        let users = self.inner.profiles.all_users().await?;
        info!(users = users.len(), "broadcast starting");
        let report = self.broadcast(users).await;
        info!(
            total = report.total,
            sent = report.sent,
            no_ad = report.no_ad,
            failed = report.failed,
            "broadcast finished"
        );
        Ok(report)
    }

    /// Spawn the daily job. Returns `false` if it is already running.
    pub async fn start_daily(&self) -> bool {
        let mut job = self.inner.daily.lock().await;
        if job.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let this = self.clone();
        let token = cancel.clone();
        job.handle = Some(tokio::spawn(async move {
            this.daily_loop(token).await;
        }));
        job.cancel = Some(cancel);
        info!(at = %self.inner.cfg.daily_at, "daily broadcast scheduled");
        true
    }

    /// Stop the daily job, including a run that is currently sending.
    pub async fn stop(&self) {
        let mut job = self.inner.daily.lock().await;
        if let Some(tok) = job.cancel.take() {
            tok.cancel();
        }
        if let Some(handle) = job.handle.take() {
            handle.abort();
        }
    }

    pub async fn is_running(&self) -> bool {
        let job = self.inner.daily.lock().await;
        job.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn daily_loop(&self, cancel: CancellationToken) {
        let now = Local::now();
        let first = next_run_after(&now, self.inner.cfg.daily_at);
        let wait = (first - now).to_std().unwrap_or_default();
        let mut next = Instant::now() + wait;

        loop {
            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep_until(next) => {
                tokio::select! {
                  _ = cancel.cancelled() => break,
                  res = self.broadcast_all() => {
                    if let Err(e) = res {
                      warn!(error = %e, "daily broadcast failed");
                    }
                  }
                }
                next += DAY;
                let now = Instant::now();
                while next <= now {
                  next += DAY;
                }
              }
            }
        }
        info!("daily broadcast stopped");
    }
}
