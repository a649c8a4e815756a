//! gitstore - version-control reconciliation engine
//!
//! Derives per-path status, safe diff payloads and a render-ready commit
//! graph from raw repository primitives.

pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::EngineConfig;
pub use error::{GitStoreError, Result};
pub use services::RepositorySession;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `default_filter`. Returns false when a subscriber
/// was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
