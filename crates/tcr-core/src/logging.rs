use std::{fmt, fs::OpenOptions, path::Path, sync::Mutex};

use chrono::Local;
use tracing_subscriber::{
    fmt::{format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{errors::Error, Result};

/// Local wall-clock timestamps, e.g. `2024-05-01 12:30:05,123`.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S,%3f"))
    }
}

/// Initialize logging to stdout and to an appending log file.
///
/// Default: info for everything. Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str, log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{service_name}=info")));

    let stdout = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime)
        .with_ansi(true);
    let to_file = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(to_file)
        .try_init()
        .map_err(|e| Error::External(format!("logging already initialized: {e}")))
}
