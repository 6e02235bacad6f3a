//! Delivery of relayed posts to the destination channel.
//!
//! Every public operation returns `true` on success and `false` on failure;
//! errors are logged here and never bubble up to the listener.

use std::{sync::Arc, time::Duration};

use tracing::{error, info, warn};

use crate::{
    domain::{IncomingMessage, MessageId, RelayMode},
    errors::Error,
    ports::ChannelPort,
    resolver::resolve_channel,
    sanitize::clean_text,
    translate::Translator,
    Result,
};

pub struct Dispatcher<P: ChannelPort> {
    port: Arc<P>,
    translator: Arc<Translator>,
    mode: RelayMode,
    source_label: String,
    destination: String,
}

impl<P: ChannelPort> Dispatcher<P> {
    pub fn new(
        port: Arc<P>,
        translator: Arc<Translator>,
        mode: RelayMode,
        source_label: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            port,
            translator,
            mode,
            source_label: source_label.into(),
            destination: destination.into(),
        }
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Relay a single (non-album) post according to the configured mode.
    pub async fn relay(&self, source: &P::Channel, msg: &IncomingMessage<P::Media>) -> bool {
        match self.mode {
            RelayMode::Forward => self.forward(source, std::slice::from_ref(msg)).await,
            RelayMode::Custom => self.send_custom(msg).await,
        }
    }

    /// Relay all parts of one album according to the configured mode.
    pub async fn relay_album(&self, source: &P::Channel, msgs: &[IncomingMessage<P::Media>]) -> bool {
        match self.mode {
            RelayMode::Forward => self.forward(source, msgs).await,
            RelayMode::Custom => self.send_album(msgs).await,
        }
    }

    /// Forward the original messages, unmodified, in one call.
    pub async fn forward(&self, source: &P::Channel, msgs: &[IncomingMessage<P::Media>]) -> bool {
        let res = self.try_forward(source, msgs).await;
        self.settle("forward message", res).await
    }

    /// Re-publish a post with cleaned, translated text.
    pub async fn send_custom(&self, msg: &IncomingMessage<P::Media>) -> bool {
        let res = self.try_send_custom(msg).await;
        self.settle("send message", res).await
    }

    /// Re-publish an album with one translated caption taken from its first item.
    pub async fn send_album(&self, msgs: &[IncomingMessage<P::Media>]) -> bool {
        let res = self.try_send_album(msgs).await;
        self.settle("send grouped media", res).await
    }

    async fn resolve_destination(&self) -> Option<P::Channel> {
        let dest = resolve_channel(self.port.as_ref(), &self.destination).await;
        if dest.is_none() {
            error!("Could not find destination channel: {}", self.destination);
        }
        dest
    }

    async fn try_forward(
        &self,
        source: &P::Channel,
        msgs: &[IncomingMessage<P::Media>],
    ) -> Result<bool> {
        let Some(dest) = self.resolve_destination().await else {
            return Ok(false);
        };
        let ids: Vec<MessageId> = msgs.iter().map(|m| m.id).collect();
        if ids.is_empty() {
            return Ok(false);
        }

        self.port.forward(&dest, source, &ids).await?;
        info!(
            "Successfully forwarded {} message(s) from {} to {}",
            ids.len(),
            self.source_label,
            self.destination
        );
        Ok(true)
    }

    async fn try_send_custom(&self, msg: &IncomingMessage<P::Media>) -> Result<bool> {
        let Some(dest) = self.resolve_destination().await else {
            return Ok(false);
        };

        let cleaned = clean_text(msg.text.as_deref());

        if let Some(media) = &msg.media {
            let caption = self.translator.translate(cleaned.as_deref()).await;
            self.port.send_media(&dest, media, &caption).await?;
            info!(
                "Successfully sent media from {} to {}",
                self.source_label, self.destination
            );
            return Ok(true);
        }

        // Text-only post made of nothing but links.
        if cleaned.is_none() {
            info!("Message contained only links - skipping");
            return Ok(true);
        }

        let text = self.translator.translate(cleaned.as_deref()).await;
        self.port.send_text(&dest, &text).await?;
        info!(
            "Successfully sent text message from {} to {}",
            self.source_label, self.destination
        );
        Ok(true)
    }

    async fn try_send_album(&self, msgs: &[IncomingMessage<P::Media>]) -> Result<bool> {
        let Some(first) = msgs.first() else {
            return Ok(false);
        };
        let Some(dest) = self.resolve_destination().await else {
            return Ok(false);
        };

        let media: Vec<P::Media> = msgs.iter().filter_map(|m| m.media.clone()).collect();
        if media.is_empty() {
            warn!("Album contained no media items - nothing to send");
            return Ok(false);
        }

        let caption = self
            .translator
            .translate(clean_text(first.text.as_deref()).as_deref())
            .await;
        self.port.send_album(&dest, &media, &caption).await?;
        info!(
            "Successfully sent album ({} items) from {} to {}",
            media.len(),
            self.source_label,
            self.destination
        );
        Ok(true)
    }

    async fn settle(&self, what: &str, res: Result<bool>) -> bool {
        match res {
            Ok(ok) => ok,
            Err(Error::RateLimited { seconds }) => {
                warn!("Rate limit hit. Waiting {seconds} seconds...");
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                false
            }
            Err(e) => {
                error!("Failed to {what}: {e}");
                false
            }
        }
    }
}
