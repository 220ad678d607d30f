use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error types for authorization and activity synchronization
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No refresh token stored - run `strava-sync authorize` to perform the initial authorization")]
    MissingRefreshToken,

    #[error("No authorization callback received within {0:?}")]
    AuthorizationTimeout(Duration),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Token refresh failed: {0} - run `strava-sync authorize` if the refresh token was revoked")]
    TokenRefresh(String),

    #[error("Failed to fetch activities: {0}")]
    Fetch(String),

    #[error("Activity {id:?} could not be converted: {reason}")]
    RecordConversion { id: Option<i64>, reason: String },

    #[error("Activities file {} is not valid JSON: {source}", path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Activities file {} is not an array of activities: {reason}", path.display())]
    InvalidStore { path: PathBuf, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {status}: {body}")]
    Http { status: u16, body: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Callback server error: {0}")]
    CallbackServer(String),

    #[cfg(feature = "browser")]
    #[error("Failed to open browser: {0}")]
    BrowserLaunch(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Errors the operator fixes by editing the credentials file or
    /// re-running the authorization flow.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration(_) | SyncError::MissingRefreshToken
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
