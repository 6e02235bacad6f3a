/// Core error type for the relay.
///
/// Adapter crates map their specific errors into this type so the relay core
/// can tell fatal failures (config, auth) from per-message ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The platform asked us to back off for `seconds` before the next call.
    #[error("rate limited: retry after {seconds}s")]
    RateLimited { seconds: u64 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
