//! Telegram adapter (grammers, MTProto user account).
//!
//! This crate implements the `tcr-core` session, channel and update ports on
//! top of a logged-in user session, so the relay can read public channels it
//! has no admin rights in.

use std::path::PathBuf;

use async_trait::async_trait;
use grammers_client::{
    types::{LoginToken, Media, Message, PackedChat, PasswordToken},
    Client, Config, InitParams, InputMedia, InputMessage, InvocationError, SignInError, Update,
};
use grammers_session::Session;
use tracing::{debug, warn};

use tcr_core::{
    domain::{ChannelRef, GroupId, IncomingMessage, MessageId},
    errors::Error,
    ports::{ChannelPort, SessionPort, SignIn, UpdatePort},
    Result,
};

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    session_file: PathBuf,
}

impl TelegramClient {
    /// Connect using the session stored in `session_file` (created if missing).
    pub async fn connect(
        api_id: i32,
        api_hash: &str,
        session_file: impl Into<PathBuf>,
    ) -> Result<Self> {
        let session_file = session_file.into();
        let session = Session::load_file_or_create(&session_file)?;

        let client = Client::connect(Config {
            session,
            api_id,
            api_hash: api_hash.to_string(),
            params: InitParams {
                // Only posts published while we run are relayed.
                catch_up: false,
                ..Default::default()
            },
        })
        .await
        .map_err(|e| Error::Auth(format!("connect failed: {e}")))?;

        debug!("connected, session file {}", session_file.display());
        Ok(Self {
            client,
            session_file,
        })
    }

    fn map_err(e: InvocationError) -> Error {
        if let InvocationError::Rpc(rpc) = &e {
            if let Some(err) = classify_rpc(&rpc.name, rpc.value) {
                return err;
            }
        }
        Error::External(format!("telegram error: {e}"))
    }

    async fn find_dialog(&self, bare_id: i64) -> Result<Option<PackedChat>> {
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(Self::map_err)? {
            let chat = dialog.chat();
            if chat.id() == bare_id {
                return Ok(Some(chat.pack()));
            }
        }
        Ok(None)
    }
}

/// Core error for RPC failures the relay reacts to; `None` for everything else.
fn classify_rpc(name: &str, value: Option<u32>) -> Option<Error> {
    match name {
        "FLOOD_WAIT" | "SLOWMODE_WAIT" => Some(Error::RateLimited {
            seconds: u64::from(value.unwrap_or(1)),
        }),
        "USERNAME_NOT_OCCUPIED" | "USERNAME_INVALID" => Some(Error::NotFound(name.to_string())),
        _ => None,
    }
}

/// An unknown channel is a normal lookup miss, not a failure.
fn missing_as_none<T>(res: Result<Option<T>>) -> Result<Option<T>> {
    match res {
        Err(Error::NotFound(_)) => Ok(None),
        other => other,
    }
}

fn non_empty_text(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Media that can be re-sent by reference. Link previews and similar
/// attachments are dropped; the post is then treated as text.
fn relayable(media: Media) -> Option<Media> {
    match media {
        Media::Photo(_) | Media::Document(_) | Media::Sticker(_) => Some(media),
        _ => None,
    }
}

fn to_incoming(message: &Message) -> IncomingMessage<Media> {
    IncomingMessage {
        id: MessageId(message.id()),
        text: non_empty_text(message.text()),
        media: message.media().and_then(relayable),
        group_id: message.grouped_id().map(|g| GroupId(g.to_string())),
    }
}

#[async_trait]
impl SessionPort for TelegramClient {
    type LoginToken = LoginToken;
    type PasswordToken = PasswordToken;

    async fn is_authorized(&self) -> Result<bool> {
        self.client.is_authorized().await.map_err(Self::map_err)
    }

    async fn request_login_code(&self, phone: &str) -> Result<LoginToken> {
        self.client
            .request_login_code(phone)
            .await
            .map_err(|e| Error::Auth(format!("login code request failed: {e}")))
    }

    async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<SignIn<PasswordToken>> {
        match self.client.sign_in(token, code).await {
            Ok(_) => Ok(SignIn::Done),
            Err(SignInError::PasswordRequired(password_token)) => {
                Ok(SignIn::PasswordRequired(password_token))
            }
            Err(e) => Err(Error::Auth(format!("sign in failed: {e}"))),
        }
    }

    fn password_hint(&self, token: &PasswordToken) -> Option<String> {
        token.hint().map(|h| h.to_string())
    }

    async fn check_password(&self, token: PasswordToken, password: &str) -> Result<()> {
        self.client
            .check_password(token, password)
            .await
            .map(|_| ())
            .map_err(|e| Error::Auth(format!("password check failed: {e}")))
    }

    fn save(&self) -> Result<()> {
        self.client.session().save_to_file(&self.session_file)?;
        Ok(())
    }

    async fn disconnect(&self) {
        if let Err(e) = self.save() {
            warn!("Failed to save session on disconnect: {e}");
        }
    }
}

#[async_trait]
impl ChannelPort for TelegramClient {
    type Channel = PackedChat;
    type Media = Media;

    async fn resolve(&self, target: &ChannelRef) -> Result<Option<PackedChat>> {
        match target {
            ChannelRef::Username(name) => missing_as_none(
                self.client
                    .resolve_username(name)
                    .await
                    .map(|chat| chat.map(|c| c.pack()))
                    .map_err(Self::map_err),
            ),
            // Ids carry no access hash, so look the channel up among our dialogs.
            ChannelRef::Id(_) => match target.bare_id() {
                Some(bare) => self.find_dialog(bare).await,
                None => Ok(None),
            },
        }
    }

    async fn forward(
        &self,
        destination: &PackedChat,
        source: &PackedChat,
        ids: &[MessageId],
    ) -> Result<()> {
        let ids: Vec<i32> = ids.iter().map(|id| id.0).collect();
        self.client
            .forward_messages(*destination, &ids, *source)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_text(&self, destination: &PackedChat, text: &str) -> Result<()> {
        self.client
            .send_message(*destination, InputMessage::text(text))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_media(&self, destination: &PackedChat, media: &Media, caption: &str) -> Result<()> {
        // Re-using the uploaded file keeps Telegram's photo/video/document rendering.
        self.client
            .send_message(*destination, InputMessage::text(caption).copy_media(media))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn send_album(
        &self,
        destination: &PackedChat,
        media: &[Media],
        caption: &str,
    ) -> Result<()> {
        let items: Vec<InputMedia> = media
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let text = if i == 0 { caption } else { "" };
                InputMedia::caption(text).copy_media(m)
            })
            .collect();

        self.client
            .send_album(*destination, items)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}

#[async_trait]
impl UpdatePort for TelegramClient {
    async fn next_message(&self, source: &PackedChat) -> Result<Option<IncomingMessage<Media>>> {
        loop {
            let update = self.client.next_update().await.map_err(Self::map_err)?;
            let Update::NewMessage(message) = update else {
                continue;
            };
            if message.chat().id() != source.id {
                continue;
            }
            return Ok(Some(to_incoming(&message)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flood_waits_become_rate_limits() {
        assert!(matches!(
            classify_rpc("FLOOD_WAIT", Some(30)),
            Some(Error::RateLimited { seconds: 30 })
        ));
        assert!(matches!(
            classify_rpc("FLOOD_WAIT", None),
            Some(Error::RateLimited { seconds: 1 })
        ));
        assert!(matches!(
            classify_rpc("SLOWMODE_WAIT", Some(10)),
            Some(Error::RateLimited { seconds: 10 })
        ));
    }

    #[test]
    fn unknown_usernames_resolve_to_none() {
        let err = classify_rpc("USERNAME_NOT_OCCUPIED", None).unwrap();
        assert!(matches!(&err, Error::NotFound(name) if name == "USERNAME_NOT_OCCUPIED"));
        assert!(missing_as_none::<i64>(Err(err)).unwrap().is_none());

        let err = classify_rpc("USERNAME_INVALID", None).unwrap();
        assert!(missing_as_none::<i64>(Err(err)).unwrap().is_none());
    }

    #[test]
    fn other_rpc_errors_are_not_classified() {
        assert!(classify_rpc("CHAT_WRITE_FORBIDDEN", None).is_none());
        assert!(classify_rpc("CHANNEL_PRIVATE", Some(5)).is_none());

        let res = missing_as_none::<i64>(Err(Error::External("CHANNEL_PRIVATE".to_string())));
        assert!(matches!(res, Err(Error::External(_))));
        assert_eq!(missing_as_none(Ok(Some(7_i64))).unwrap(), Some(7));
    }

    #[test]
    fn empty_post_text_is_none() {
        assert_eq!(non_empty_text(""), None);
        assert_eq!(non_empty_text("Breaking"), Some("Breaking".to_string()));
    }
}
