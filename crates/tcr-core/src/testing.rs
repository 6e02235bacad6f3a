//! In-memory port doubles shared by the unit tests.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{ChannelRef, IncomingMessage, MessageId},
    errors::Error,
    ports::{ChannelPort, CompletionPort, CompletionRequest, UpdatePort},
    translate::{Translator, TranslatorConfig},
    Result,
};

/// Replies with a canned completion, or fails when `reply` is `None`.
#[derive(Default)]
pub(crate) struct FakeCompletion {
    pub reply: Option<String>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub(crate) fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionPort for FakeCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(req);
        self.reply
            .clone()
            .ok_or_else(|| Error::External("quota exceeded".to_string()))
    }
}

pub(crate) fn translator(backend: Arc<FakeCompletion>) -> Translator {
    Translator::new(
        backend,
        TranslatorConfig {
            model: "gpt-4o".to_string(),
            max_tokens: 500,
            temperature: 0.1,
            attribution_tag: "@pullab_news".to_string(),
        },
    )
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Forward {
        dest: String,
        source: String,
        ids: Vec<i32>,
    },
    Text {
        dest: String,
        text: String,
    },
    Media {
        dest: String,
        media: String,
        caption: String,
    },
    Album {
        dest: String,
        media: Vec<String>,
        caption: String,
    },
}

/// Platform double: channels resolve to `chan:<name>`, media handles are strings.
pub(crate) struct FakePlatform {
    known: HashSet<ChannelRef>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<VecDeque<Error>>,
    resolves: AtomicUsize,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<IncomingMessage<String>>>,
    outbox: Mutex<Option<mpsc::UnboundedSender<IncomingMessage<String>>>>,
}

impl FakePlatform {
    pub(crate) fn with_channels(channels: &[&str]) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            known: channels.iter().map(|c| ChannelRef::parse(c)).collect(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            resolves: AtomicUsize::new(0),
            inbox: tokio::sync::Mutex::new(rx),
            outbox: Mutex::new(Some(tx)),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    /// Make the next outbound call fail with `err`.
    pub(crate) fn fail_next(&self, err: Error) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Deliver a post to whoever is listening on `next_message`.
    pub(crate) fn publish(&self, msg: IncomingMessage<String>) {
        if let Some(tx) = self.outbox.lock().unwrap().as_ref() {
            let _ = tx.send(msg);
        }
    }

    /// End the update stream once queued posts are consumed.
    pub(crate) fn close(&self) {
        self.outbox.lock().unwrap().take();
    }

    fn record(&self, call: Call) -> Result<()> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl ChannelPort for FakePlatform {
    type Channel = String;
    type Media = String;

    async fn resolve(&self, target: &ChannelRef) -> Result<Option<String>> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if !self.known.contains(target) {
            return Ok(None);
        }
        Ok(Some(match target {
            ChannelRef::Username(name) => format!("chan:{name}"),
            ChannelRef::Id(id) => format!("chan:{id}"),
        }))
    }

    async fn forward(&self, destination: &String, source: &String, ids: &[MessageId]) -> Result<()> {
        self.record(Call::Forward {
            dest: destination.clone(),
            source: source.clone(),
            ids: ids.iter().map(|id| id.0).collect(),
        })
    }

    async fn send_text(&self, destination: &String, text: &str) -> Result<()> {
        self.record(Call::Text {
            dest: destination.clone(),
            text: text.to_string(),
        })
    }

    async fn send_media(&self, destination: &String, media: &String, caption: &str) -> Result<()> {
        self.record(Call::Media {
            dest: destination.clone(),
            media: media.clone(),
            caption: caption.to_string(),
        })
    }

    async fn send_album(&self, destination: &String, media: &[String], caption: &str) -> Result<()> {
        self.record(Call::Album {
            dest: destination.clone(),
            media: media.to_vec(),
            caption: caption.to_string(),
        })
    }
}

#[async_trait]
impl UpdatePort for FakePlatform {
    async fn next_message(&self, _source: &String) -> Result<Option<IncomingMessage<String>>> {
        Ok(self.inbox.lock().await.recv().await)
    }
}

/// Session that is already signed in; records whether it was disconnected.
#[derive(Default)]
pub(crate) struct SignedInSession {
    pub disconnected: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl crate::ports::SessionPort for SignedInSession {
    type LoginToken = ();
    type PasswordToken = ();

    async fn is_authorized(&self) -> Result<bool> {
        Ok(true)
    }

    async fn request_login_code(&self, _phone: &str) -> Result<()> {
        Err(Error::Auth("unexpected login".to_string()))
    }

    async fn sign_in(&self, _token: &(), _code: &str) -> Result<crate::ports::SignIn<()>> {
        Err(Error::Auth("unexpected login".to_string()))
    }

    fn password_hint(&self, _token: &()) -> Option<String> {
        None
    }

    async fn check_password(&self, _token: (), _password: &str) -> Result<()> {
        Err(Error::Auth("unexpected login".to_string()))
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
