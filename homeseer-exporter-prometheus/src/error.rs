//! Error types for the bridge.

use homeseer_status::FetchError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistryError;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised while building or running a bridge.
///
/// `Config` and `Registry` only occur at construction and are never retried.
/// `Fetch` aborts a single poll.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The password is never part of the message.
    #[error("fetching status from {target:?} as {user:?} (password elided): {source}")]
    Fetch {
        target: String,
        user: String,
        #[source]
        source: FetchError,
    },
}

impl BridgeError {
    /// Whether this error aborted a poll rather than construction.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}
