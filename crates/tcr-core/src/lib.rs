//! Core relay logic for the Telegram channel relay.
//!
//! This crate is intentionally framework-agnostic. The Telegram client and the
//! translation model live behind ports (traits) implemented in adapter crates.

pub mod album;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod monitor;
pub mod ports;
pub mod resolver;
pub mod sanitize;
pub mod translate;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
