//! Collects the parts of an album (posts sharing a group id) before relaying.
//!
//! Telegram delivers each album item as its own update. The buffer opens an
//! entry on the first item, schedules exactly one flush `delay` later, and
//! appends everything that arrives in between. The window is a best-effort
//! bound: an item delayed past the flush opens a fresh entry and is relayed
//! as a separate album.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use crate::domain::{GroupId, IncomingMessage};

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type FlushFn<M> = Arc<dyn Fn(GroupId, Vec<IncomingMessage<M>>) -> BoxFuture + Send + Sync>;

struct PendingAlbum<M> {
    messages: Vec<IncomingMessage<M>>,
    cancel: CancellationToken,
}

pub struct AlbumBuffer<M> {
    delay: Duration,
    flush: FlushFn<M>,
    pending: Mutex<HashMap<GroupId, PendingAlbum<M>>>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl<M: Send + Sync + 'static> AlbumBuffer<M> {
    /// Timers (and the flushes they run) are spawned on `tasks`, so whoever
    /// owns the tracker can wait for in-flight album deliveries.
    pub fn new(delay: Duration, flush: FlushFn<M>, tasks: TaskTracker) -> Arc<Self> {
        Arc::new(Self {
            delay,
            flush,
            pending: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            tasks,
        })
    }

    /// Buffer one album item. Returns `true` when it opened a new group.
    ///
    /// Items without a group id are rejected (logged and dropped).
    pub async fn push(self: &Arc<Self>, msg: IncomingMessage<M>) -> bool {
        let Some(group_id) = msg.group_id.clone() else {
            warn!("message {} has no group id; not buffering", msg.id.0);
            return false;
        };

        let mut map = self.pending.lock().await;
        if let Some(group) = map.get_mut(&group_id) {
            group.messages.push(msg);
            debug!(
                "album {group_id}: buffered item {}",
                group.messages.len()
            );
            return false;
        }

        let cancel = self.shutdown.child_token();
        map.insert(
            group_id.clone(),
            PendingAlbum {
                messages: vec![msg],
                cancel: cancel.clone(),
            },
        );
        drop(map);

        debug!("album {group_id}: opened, flushing in {:?}", self.delay);
        self.spawn_timer(group_id, cancel);
        true
    }

    fn spawn_timer(self: &Arc<Self>, group_id: GroupId, cancel: CancellationToken) {
        let buffer = Arc::clone(self);
        let delay = self.delay;
        self.tasks.spawn(async move {
            tokio::select! {
              _ = cancel.cancelled() => {}
              _ = tokio::time::sleep(delay) => {
                buffer.flush_group(&group_id).await;
              }
            }
        });
    }

    async fn flush_group(&self, group_id: &GroupId) {
        // Removing under the lock is what guarantees a single flush per group.
        let group = {
            let mut map = self.pending.lock().await;
            map.remove(group_id)
        };

        let Some(group) = group else {
            return;
        };
        if group.messages.is_empty() {
            return;
        }

        (self.flush)(group_id.clone(), group.messages).await;
    }

    /// Number of albums still waiting for their flush.
    pub async fn pending_groups(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Cancel every scheduled flush and drop the buffered items.
    /// Flushes already running are left to finish on the tracker.
    ///
    /// Returns how many albums were dropped.
    pub async fn shutdown(&self) -> usize {
        self.shutdown.cancel();
        let mut map = self.pending.lock().await;
        let dropped = map.len();
        for (group_id, group) in map.drain() {
            group.cancel.cancel();
            warn!(
                "album {group_id}: dropped {} buffered item(s) on shutdown",
                group.messages.len()
            );
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use tokio::time::sleep;

    use super::*;
    use crate::domain::MessageId;

    type Flushed = Arc<StdMutex<Vec<(GroupId, Vec<i32>)>>>;

    fn recording_buffer(delay: Duration) -> (Arc<AlbumBuffer<String>>, Flushed) {
        let flushed: Flushed = Arc::new(StdMutex::new(Vec::new()));
        let sink = flushed.clone();
        let flush: FlushFn<String> = Arc::new(
            move |group_id: GroupId, messages: Vec<IncomingMessage<String>>| {
                let sink = sink.clone();
                let fut: BoxFuture = Box::pin(async move {
                    let ids = messages.iter().map(|m| m.id.0).collect();
                    sink.lock().unwrap().push((group_id, ids));
                });
                fut
            },
        );
        (AlbumBuffer::new(delay, flush, TaskTracker::new()), flushed)
    }

    fn item(id: i32, group: &str) -> IncomingMessage<String> {
        IncomingMessage::new(MessageId(id), "")
            .with_media(format!("photo-{id}"))
            .in_group(group)
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_all_items_once_after_delay() {
        let (buffer, flushed) = recording_buffer(Duration::from_secs(1));

        assert!(buffer.push(item(1, "g")).await);
        sleep(Duration::from_millis(200)).await;
        assert!(!buffer.push(item(2, "g")).await);
        sleep(Duration::from_millis(200)).await;
        assert!(!buffer.push(item(3, "g")).await);

        assert!(flushed.lock().unwrap().is_empty());
        sleep(Duration::from_millis(700)).await;

        let got = flushed.lock().unwrap().clone();
        assert_eq!(got, vec![(GroupId("g".into()), vec![1, 2, 3])]);
        assert_eq!(buffer.pending_groups().await, 0);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(flushed.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_is_not_reset_by_later_items() {
        let (buffer, flushed) = recording_buffer(Duration::from_secs(1));

        buffer.push(item(1, "g")).await;
        sleep(Duration::from_millis(900)).await;
        buffer.push(item(2, "g")).await;
        sleep(Duration::from_millis(150)).await;

        assert_eq!(
            flushed.lock().unwrap().clone(),
            vec![(GroupId("g".into()), vec![1, 2])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_item_opens_a_new_group() {
        let (buffer, flushed) = recording_buffer(Duration::from_secs(1));

        buffer.push(item(1, "g")).await;
        sleep(Duration::from_millis(1100)).await;
        assert!(buffer.push(item(2, "g")).await);
        sleep(Duration::from_millis(1100)).await;

        let got = flushed.lock().unwrap().clone();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].1, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn groups_flush_independently() {
        let (buffer, flushed) = recording_buffer(Duration::from_secs(1));

        buffer.push(item(1, "a")).await;
        buffer.push(item(2, "b")).await;
        buffer.push(item(3, "a")).await;
        buffer.push(item(4, "b")).await;
        assert_eq!(buffer.pending_groups().await, 2);
        sleep(Duration::from_millis(1050)).await;

        let mut got = flushed.lock().unwrap().clone();
        got.sort_by(|x, y| x.0 .0.cmp(&y.0 .0));
        assert_eq!(
            got,
            vec![
                (GroupId("a".into()), vec![1, 3]),
                (GroupId("b".into()), vec![2, 4]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_flushes() {
        let (buffer, flushed) = recording_buffer(Duration::from_secs(1));

        buffer.push(item(1, "a")).await;
        buffer.push(item(2, "b")).await;
        assert_eq!(buffer.shutdown().await, 2);
        sleep(Duration::from_secs(2)).await;

        assert!(flushed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn running_flush_is_tracked_through_shutdown() {
        let flushed: Flushed = Arc::new(StdMutex::new(Vec::new()));
        let sink = flushed.clone();
        let flush: FlushFn<String> = Arc::new(
            move |group_id: GroupId, messages: Vec<IncomingMessage<String>>| {
                let sink = sink.clone();
                let fut: BoxFuture = Box::pin(async move {
                    sleep(Duration::from_secs(3)).await;
                    let ids = messages.iter().map(|m| m.id.0).collect();
                    sink.lock().unwrap().push((group_id, ids));
                });
                fut
            },
        );
        let tasks = TaskTracker::new();
        let buffer = AlbumBuffer::new(Duration::from_secs(1), flush, tasks.clone());

        buffer.push(item(1, "g")).await;
        sleep(Duration::from_millis(1100)).await;

        // The flush has taken the entry and is still sending.
        assert_eq!(buffer.shutdown().await, 0);
        assert!(flushed.lock().unwrap().is_empty());

        tasks.close();
        tasks.wait().await;
        assert_eq!(
            flushed.lock().unwrap().clone(),
            vec![(GroupId("g".into()), vec![1])]
        );
    }

    #[tokio::test]
    async fn ungrouped_messages_are_rejected() {
        let (buffer, _) = recording_buffer(Duration::from_secs(1));
        let single: IncomingMessage<String> = IncomingMessage::new(MessageId(9), "hi");
        assert!(!buffer.push(single).await);
        assert_eq!(buffer.pending_groups().await, 0);
    }
}
