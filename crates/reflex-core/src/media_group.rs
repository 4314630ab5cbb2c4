//! Coalesces album photos into one batch.
//!
//! The transport delivers every photo of an album as a separate update that
//! shares a group id, with no "album complete" signal. The debouncer buffers
//! per group id and flushes the whole group once the quiescence window
//! after its first photo has elapsed.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::debug;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type FlushFn<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture + Send + Sync>;

pub struct MediaGroupDebouncer<T> {
    window: Duration,
    flush: FlushFn<T>,
    pending: Mutex<HashMap<String, Vec<T>>>,
}

impl<T: Send + 'static> MediaGroupDebouncer<T> {
    pub fn new(window: Duration, flush: FlushFn<T>) -> Arc<Self> {
        Arc::new(Self {
            window,
            flush,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Accept one photo event.
    ///
    /// Without a group id the event is flushed inline as a batch of one.
    /// Photos arriving after their group was flushed open a new group.
    pub async fn on_image(self: &Arc<Self>, group_id: Option<String>, item: T) {
        let Some(group_id) = group_id else {
            (self.flush)(vec![item]).await;
            return;
        };

        self.pending
            .lock()
            .await
            .entry(group_id.clone())
            .or_default()
            .push(item);
        // Every arrival arms its own check; only the first one to fire finds
        // the buffer.
        self.spawn_timer(group_id);
    }

    fn spawn_timer(self: &Arc<Self>, group_id: String) {
        let debouncer = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(debouncer.window).await;
            let items = debouncer.pending.lock().await.remove(&group_id);
            if let Some(items) = items.filter(|i| !i.is_empty()) {
                debug!(group = %group_id, count = items.len(), "flushing media group");
                (debouncer.flush)(items).await;
            }
        });
    }

    pub async fn pending_groups(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    type Flushed = Arc<StdMutex<Vec<Vec<&'static str>>>>;

    fn recorder(window: Duration) -> (Arc<MediaGroupDebouncer<&'static str>>, Flushed) {
        let flushed: Flushed = Arc::default();
        let sink = flushed.clone();
        let debouncer = MediaGroupDebouncer::new(
            window,
            Arc::new(move |items: Vec<&'static str>| -> BoxFuture {
                let sink = sink.clone();
                Box::pin(async move {
                    sink.lock().unwrap().push(items);
                })
            }),
        );
        (debouncer, flushed)
    }

    const WINDOW: Duration = Duration::from_millis(1200);

    #[tokio::test(start_paused = true)]
    async fn album_is_flushed_once_in_arrival_order() {
        let (d, flushed) = recorder(WINDOW);
        d.on_image(Some("g1".into()), "a").await;
        tokio::time::advance(Duration::from_millis(100)).await;
        d.on_image(Some("g1".into()), "b").await;
        d.on_image(Some("g1".into()), "c").await;
        assert!(flushed.lock().unwrap().is_empty());

        tokio::time::sleep(WINDOW).await;
        assert_eq!(*flushed.lock().unwrap(), vec![vec!["a", "b", "c"]]);
        assert_eq!(d.pending_groups().await, 0);

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(flushed.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lone_photo_is_not_delayed() {
        let (d, flushed) = recorder(WINDOW);
        let start = tokio::time::Instant::now();
        d.on_image(None, "solo").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(*flushed.lock().unwrap(), vec![vec!["solo"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn groups_flush_independently() {
        let (d, flushed) = recorder(WINDOW);
        d.on_image(Some("g1".into()), "a1").await;
        d.on_image(Some("g2".into()), "b1").await;
        d.on_image(Some("g1".into()), "a2").await;

        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        let mut got = flushed.lock().unwrap().clone();
        got.sort();
        assert_eq!(got, vec![vec!["a1", "a2"], vec!["b1"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_arrival_forms_a_new_batch() {
        let (d, flushed) = recorder(WINDOW);
        d.on_image(Some("g1".into()), "a").await;
        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;

        d.on_image(Some("g1".into()), "late").await;
        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        assert_eq!(*flushed.lock().unwrap(), vec![vec!["a"], vec!["late"]]);
    }
}
