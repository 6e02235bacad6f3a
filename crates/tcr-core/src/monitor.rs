//! Long-lived listener: watches the source channel and hands every new post
//! to the dispatcher.

use std::{sync::Arc, time::Duration};

use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info, warn};

use crate::{
    album::{AlbumBuffer, BoxFuture, FlushFn},
    auth::authenticate,
    dispatch::Dispatcher,
    domain::{GroupId, IncomingMessage},
    ports::{Prompter, SessionPort, UpdatePort},
    resolver::resolve_channel,
    utils::excerpt,
    Result,
};

/// How long shutdown waits for in-flight deliveries before giving up on them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MonitorSettings {
    pub phone_number: String,
    pub source_channel: String,
    pub album_debounce: Duration,
}

pub struct Monitor<P: UpdatePort, S: SessionPort> {
    session: Arc<S>,
    platform: Arc<P>,
    dispatcher: Arc<Dispatcher<P>>,
    prompter: Arc<dyn Prompter>,
    settings: MonitorSettings,
}

impl<P, S> Monitor<P, S>
where
    P: UpdatePort,
    S: SessionPort,
{
    pub fn new(
        session: Arc<S>,
        platform: Arc<P>,
        dispatcher: Arc<Dispatcher<P>>,
        prompter: Arc<dyn Prompter>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            session,
            platform,
            dispatcher,
            prompter,
            settings,
        }
    }

    /// Sign in, then relay posts until `shutdown` fires or the update stream ends.
    ///
    /// Authentication failures are returned; per-message failures never are.
    /// The session is disconnected on every exit path.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let result = match authenticate(
            self.session.as_ref(),
            &self.settings.phone_number,
            self.prompter.as_ref(),
        )
        .await
        {
            Ok(()) => self.watch(shutdown).await,
            Err(e) => Err(e),
        };

        self.session.disconnect().await;
        result
    }

    async fn watch(&self, shutdown: CancellationToken) -> Result<()> {
        let source_label = self.settings.source_channel.clone();
        let Some(source) = resolve_channel(self.platform.as_ref(), &source_label).await else {
            error!("Could not find source channel: {source_label}");
            return Ok(());
        };

        info!("Starting to monitor {source_label} for new posts...");
        info!(
            "Messages will be {} to {}",
            self.dispatcher.mode().describe(),
            self.dispatcher.destination()
        );

        // Single deliveries and album flushes share one tracker and one drain.
        let tracker = TaskTracker::new();
        let albums = AlbumBuffer::new(
            self.settings.album_debounce,
            self.album_flush(source.clone()),
            tracker.clone(),
        );

        info!("Monitor is running. Press Ctrl+C to stop.");
        let outcome = loop {
            let next = tokio::select! {
              _ = shutdown.cancelled() => {
                info!("Monitoring stopped by user");
                break Ok(());
              }
              next = self.platform.next_message(&source) => next,
            };

            match next {
                Ok(Some(msg)) => self.handle(&albums, &tracker, &source, msg).await,
                Ok(None) => {
                    warn!("Update stream from {source_label} ended");
                    break Ok(());
                }
                Err(e) => {
                    error!("Error during monitoring: {e}");
                    break Err(e);
                }
            }
        };

        let dropped = albums.shutdown().await;
        if dropped > 0 {
            warn!("{dropped} album(s) were still waiting and have been dropped");
        }

        tracker.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "{} delivery task(s) still running at shutdown",
                tracker.len()
            );
        }

        outcome
    }

    async fn handle(
        &self,
        albums: &Arc<AlbumBuffer<P::Media>>,
        tracker: &TaskTracker,
        source: &P::Channel,
        msg: IncomingMessage<P::Media>,
    ) {
        if msg.group_id.is_some() {
            albums.push(msg).await;
            return;
        }

        info!(
            "New message detected in {}: {}...",
            self.settings.source_channel,
            excerpt(msg.text.as_deref())
        );

        // Each post gets its own task so a slow send (or a rate-limit wait)
        // does not hold up the next notification.
        let dispatcher = Arc::clone(&self.dispatcher);
        let source = source.clone();
        tracker.spawn(async move {
            if dispatcher.relay(&source, &msg).await {
                info!("Message processed successfully!");
            } else {
                warn!("Failed to process message");
            }
        });
    }

    fn album_flush(&self, source: P::Channel) -> FlushFn<P::Media> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let source_label = self.settings.source_channel.clone();

        Arc::new(
            move |group_id: GroupId, msgs: Vec<IncomingMessage<P::Media>>| {
                let dispatcher = Arc::clone(&dispatcher);
                let source = source.clone();
                let source_label = source_label.clone();
                let fut: BoxFuture = Box::pin(async move {
                    info!(
                        "New album detected in {source_label} with {} items",
                        msgs.len()
                    );
                    if dispatcher.relay_album(&source, &msgs).await {
                        info!("Album {group_id} processed successfully!");
                    } else {
                        warn!("Failed to process album {group_id}");
                    }
                });
                fut
            },
        )
    }
}
