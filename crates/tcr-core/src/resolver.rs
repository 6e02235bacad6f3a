use tracing::error;

use crate::{domain::ChannelRef, ports::ChannelPort};

/// Resolve a configured channel (`@handle`, `handle` or `-100…` id).
///
/// Lookup failures are logged and reported as `None`; the caller abandons
/// the current operation. Nothing is cached: each call asks the platform.
pub async fn resolve_channel<P: ChannelPort + ?Sized>(port: &P, raw: &str) -> Option<P::Channel> {
    let target = ChannelRef::parse(raw);
    match port.resolve(&target).await {
        Ok(Some(channel)) => Some(channel),
        Ok(None) => {
            error!("Failed to get channel entity for {target}: not found");
            None
        }
        Err(e) => {
            error!("Failed to get channel entity for {target}: {e}");
            None
        }
    }
}
