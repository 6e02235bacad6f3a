use std::fmt;

/// Telegram message id within a chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Identifier shared by every part of one album.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A channel as written in configuration: a public handle or a raw numeric id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Username(String),
    /// Full Bot-API style id, e.g. `-1001234567890`.
    Id(i64),
}

/// Prefix Telegram puts in front of channel ids in their "marked" form.
pub const CHANNEL_ID_PREFIX: &str = "-100";

impl ChannelRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix('@') {
            return Self::Username(name.to_string());
        }
        if raw.starts_with(CHANNEL_ID_PREFIX) {
            if let Ok(id) = raw.parse::<i64>() {
                return Self::Id(id);
            }
        }
        Self::Username(raw.to_string())
    }

    /// Bare channel id (without the `-100` marker), as MTProto reports it.
    pub fn bare_id(&self) -> Option<i64> {
        let Self::Id(id) = self else {
            return None;
        };
        id.to_string()
            .strip_prefix(CHANNEL_ID_PREFIX)
            .and_then(|s| s.parse::<i64>().ok())
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username(name) => write!(f, "@{name}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// A new post observed in the source channel.
///
/// `M` is the adapter's opaque media handle; the core never looks inside it.
#[derive(Clone, Debug)]
pub struct IncomingMessage<M> {
    pub id: MessageId,
    pub text: Option<String>,
    pub media: Option<M>,
    pub group_id: Option<GroupId>,
}

impl<M> IncomingMessage<M> {
    pub fn new(id: MessageId, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id,
            text: if text.is_empty() { None } else { Some(text) },
            media: None,
            group_id: None,
        }
    }

    pub fn with_media(mut self, media: M) -> Self {
        self.media = Some(media);
        self
    }

    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(GroupId(group_id.into()));
        self
    }
}

/// How posts reach the destination channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayMode {
    /// Forward the original message untouched (needs rights in the destination).
    Forward,
    /// Rebuild the post with cleaned, translated text.
    Custom,
}

impl RelayMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "forward" | "forwarding" => Some(Self::Forward),
            "custom" | "translate" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Forward => "forwarded",
            Self::Custom => "sent as custom messages",
        }
    }
}
