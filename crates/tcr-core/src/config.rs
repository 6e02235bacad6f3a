use std::{env, path::PathBuf, time::Duration};

use crate::{domain::RelayMode, errors::Error, Result};

pub const DEFAULT_SOURCE_CHANNEL: &str = "WatcherGuru";
pub const DEFAULT_SESSION_NAME: &str = "watcher_guru_monitor";
pub const DEFAULT_ATTRIBUTION_TAG: &str = "@pullab_news";

/// Typed configuration for the relay.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram account
    pub api_id: i32,
    pub api_hash: String,
    pub phone_number: String,
    pub session_name: String,

    // Channels
    pub source_channel: String,
    pub destination_channel: String,
    pub relay_mode: RelayMode,
    pub album_debounce: Duration,

    // Translation
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub translation_max_tokens: u32,
    pub translation_temperature: f32,
    pub translation_timeout: Duration,
    pub attribution_tag: String,

    // Logging
    pub log_file: PathBuf,
}

impl Config {
    /// Load from the process environment, after pulling in `.env` if present.
    ///
    /// Variables already set in the environment take precedence over `.env`.
    /// A missing `.env` is fine; one that cannot be parsed is a config error.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("failed to read .env: {e}"))),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required env vars
        let mut missing = Vec::new();
        let mut require = |key: &'static str| {
            let v = get(key);
            if v.is_none() {
                missing.push(key);
            }
            v.unwrap_or_default()
        };
        let api_id_raw = require("API_ID");
        let api_hash = require("API_HASH");
        let phone_number = require("PHONE_NUMBER");
        let destination_channel = require("DESTINATION_CHANNEL");
        let openai_api_key = require("OPENAI_API_KEY");

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required environment variables: {}. Check your .env file.",
                missing.join(", ")
            )));
        }

        let api_id = api_id_raw
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::Config(format!("API_ID must be an integer, got {api_id_raw:?}")))?;

        let source_channel =
            get("SOURCE_CHANNEL").unwrap_or_else(|| DEFAULT_SOURCE_CHANNEL.to_string());
        let session_name = get("SESSION_NAME").unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());

        let relay_mode = match get("RELAY_MODE") {
            None => RelayMode::Custom,
            Some(raw) => RelayMode::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "RELAY_MODE must be `custom` or `forward`, got {raw:?}"
                ))
            })?,
        };
        let album_debounce = Duration::from_millis(parse_or(
            "ALBUM_DEBOUNCE_MS",
            get("ALBUM_DEBOUNCE_MS"),
            1000_u64,
        )?);

        // Translation
        let openai_base_url = get("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let openai_model = get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let translation_max_tokens =
            parse_or("TRANSLATION_MAX_TOKENS", get("TRANSLATION_MAX_TOKENS"), 500_u32)?;
        let translation_temperature =
            parse_or("TRANSLATION_TEMPERATURE", get("TRANSLATION_TEMPERATURE"), 0.1_f32)?;
        let translation_timeout = Duration::from_millis(parse_or(
            "TRANSLATION_TIMEOUT_MS",
            get("TRANSLATION_TIMEOUT_MS"),
            30_000_u64,
        )?);
        let attribution_tag =
            get("ATTRIBUTION_TAG").unwrap_or_else(|| DEFAULT_ATTRIBUTION_TAG.to_string());

        let log_file =
            PathBuf::from(get("LOG_FILE").unwrap_or_else(|| "telegram_monitor.log".to_string()));

        Ok(Self {
            api_id,
            api_hash,
            phone_number,
            session_name,
            source_channel,
            destination_channel,
            relay_mode,
            album_debounce,
            openai_api_key,
            openai_base_url,
            openai_model,
            translation_max_tokens,
            translation_temperature,
            translation_timeout,
            attribution_tag,
            log_file,
        })
    }

    /// File the platform session is persisted to between runs.
    pub fn session_file(&self) -> PathBuf {
        PathBuf::from(format!("{}.session", self.session_name))
    }
}

/// `default` when the key is unset; a value that does not parse is an error.
fn parse_or<T: std::str::FromStr>(key: &str, v: Option<String>, default: T) -> Result<T> {
    match v {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw:?}"))),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
