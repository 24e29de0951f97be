//! Prometheus metrics exporter for HomeSeer device status.
//!
//! This crate polls a HomeSeer hub's JSON status interface, classifies the
//! reported devices and exposes their readings as Prometheus gauges via an
//! HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  HomeSeer hub   │────>│     Bridge      │────>│   HTTP Server   │
//! │ (getstatus API) │     │ (classify, set) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!          ^                       ^
//!          └──── PollWorker ───────┘   (interval mode)
//! ```
//!
//! In on-demand mode there is no worker; each scrape triggers one poll.
//!
//! # Usage
//!
//! ```bash
//! homeseer-exporter-prometheus --config homeseer.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod bridge;
pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod registry;
pub mod worker;

pub use bridge::{Bridge, BridgeOptions, BridgeStats, PollSummary, StatusSource};
pub use classify::FamilyDescriptor;
pub use config::{ExporterConfig, LogFormat, LoggingConfig, PollMode};
pub use error::{BridgeError, Result};
pub use http::HttpServer;
pub use registry::MetricRegistry;
pub use worker::{PollWorker, Scheduler};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}
