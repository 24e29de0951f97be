use thiserror::Error;

/// A `last_change` value that does not follow the `/Date(<millis>[<offset>])/` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("malformed date: {0:?}")]
    Malformed(String),
}

/// Credentials that cannot be presented to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("a username is required")]
    MissingUsername,

    #[error("username {username:?} was given without a password")]
    MissingPassword { username: String },
}

/// Errors returned while fetching a status snapshot.
///
/// Any of these aborts the whole fetch; a partial snapshot is never returned.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GET {url:?}: got code {code}, want 200")]
    StatusCode { url: String, code: u16 },

    #[error("homeseer error: {0:?}")]
    Remote(String),

    #[error("Failed to parse status response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    MalformedDate(#[from] DateError),
}

/// Result type alias using [`FetchError`].
pub type Result<T> = std::result::Result<T, FetchError>;
