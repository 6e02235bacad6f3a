use std::fmt;

use async_trait::async_trait;

use crate::{
    domain::{ChannelRef, IncomingMessage, MessageId},
    Result,
};

/// Outcome of submitting a login code.
pub enum SignIn<P> {
    Done,
    /// The account has two-factor protection; submit the password next.
    PasswordRequired(P),
}

/// Authenticated session against the messaging platform.
#[async_trait]
pub trait SessionPort: Send + Sync {
    type LoginToken: Send + Sync;
    type PasswordToken: Send + Sync;

    async fn is_authorized(&self) -> Result<bool>;
    async fn request_login_code(&self, phone: &str) -> Result<Self::LoginToken>;
    async fn sign_in(
        &self,
        token: &Self::LoginToken,
        code: &str,
    ) -> Result<SignIn<Self::PasswordToken>>;

    /// Hint the user configured for their 2FA password, if any.
    fn password_hint(&self, token: &Self::PasswordToken) -> Option<String>;
    async fn check_password(&self, token: Self::PasswordToken, password: &str) -> Result<()>;

    /// Persist the session so the next start skips the login flow.
    fn save(&self) -> Result<()>;
    async fn disconnect(&self);
}

/// Channel-level read/write operations.
#[async_trait]
pub trait ChannelPort: Send + Sync + 'static {
    /// Resolved, ready-to-use channel handle.
    type Channel: Clone + fmt::Debug + Send + Sync + 'static;
    /// Media attached to an incoming post, reusable when re-sending.
    type Media: Clone + Send + Sync + 'static;

    /// `Ok(None)` when the platform has no such channel.
    async fn resolve(&self, target: &ChannelRef) -> Result<Option<Self::Channel>>;

    async fn forward(
        &self,
        destination: &Self::Channel,
        source: &Self::Channel,
        ids: &[MessageId],
    ) -> Result<()>;

    async fn send_text(&self, destination: &Self::Channel, text: &str) -> Result<()>;

    /// Send one media item with a caption. The platform picks photo/video/document
    /// rendering from the original file.
    async fn send_media(
        &self,
        destination: &Self::Channel,
        media: &Self::Media,
        caption: &str,
    ) -> Result<()>;

    /// Send several media items as one album; `caption` goes on the album.
    async fn send_album(
        &self,
        destination: &Self::Channel,
        media: &[Self::Media],
        caption: &str,
    ) -> Result<()>;
}

/// Stream of new posts from a channel.
#[async_trait]
pub trait UpdatePort: ChannelPort {
    /// Wait for the next new post in `source`. `Ok(None)` means the stream ended.
    async fn next_message(
        &self,
        source: &Self::Channel,
    ) -> Result<Option<IncomingMessage<Self::Media>>>;
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Chat-style language model endpoint.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<String>;
}

/// Interactive input for the login flow (login code, 2FA password).
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, label: &str) -> Result<String>;
}

/// Reads answers from stdin on a blocking thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdinPrompter;

#[async_trait]
impl Prompter for StdinPrompter {
    async fn prompt(&self, label: &str) -> Result<String> {
        let label = label.to_string();
        tokio::task::spawn_blocking(move || -> Result<String> {
            use std::io::{BufRead, Write};

            let mut out = std::io::stdout();
            out.write_all(label.as_bytes())?;
            out.flush()?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await
        .map_err(|e| crate::Error::External(format!("prompt task failed: {e}")))?
    }
}
