//! Broker Gateway Library
//!
//! Core subsystems of a transparent TLS-intercepting proxy for clustered
//! brokers: clients connect to proxy-exposed addresses, the proxy terminates
//! inbound TLS with an impostor certificate forged on the fly to match the
//! real broker's identity, then relays to the actual backend.
//!
//! # Subsystems
//!
//! - **Certificate authority plugins** ([`ca`]): pluggable strategies that,
//!   given a real peer certificate, mint an ephemeral impersonation
//!   credential — same subject identity and validity window, fresh key pair,
//!   signed by an operator-controlled CA.
//! - **Broker map** ([`brokermap`]): bidirectional O(1) registry between
//!   real broker endpoints, logical broker names, and externally exposed
//!   proxy endpoints, with a filterable proxied subset.
//!
//! The TLS socket plumbing, protocol rewriting, and per-connection relay
//! loop are external consumers of these values; this crate produces and
//! consumes only in-process data.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod brokermap;
pub mod ca;
pub mod cli;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
