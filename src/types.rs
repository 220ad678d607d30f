use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Scopes requested during the one-time authorization
pub const DEFAULT_SCOPES: &[&str] = &["read_all", "activity:read_all", "profile:read_all"];

/// Port of the local redirect listener; must match the callback domain
/// registered for the Strava application.
pub const DEFAULT_CALLBACK_PORT: u16 = 8000;

/// OAuth token pair returned by the Strava token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Short-lived token authorizing API calls
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens
    pub refresh_token: String,
    /// Unix timestamp (seconds) when the access token expires
    pub expires_at: u64,
}

impl TokenSet {
    /// Check if the token is expired or will expire within 5 minutes
    pub fn is_expired(&self) -> bool {
        self.expires_in() <= Duration::from_secs(300)
    }

    /// Get the duration until the token expires
    ///
    /// Returns `Duration::ZERO` if the token is already expired.
    pub fn expires_in(&self) -> Duration {
        let now = unix_now();
        Duration::from_secs(self.expires_at.saturating_sub(now))
    }
}

/// Configuration for talking to Strava
#[derive(Debug, Clone)]
pub struct StravaConfig {
    /// Application client ID from https://www.strava.com/settings/api
    pub client_id: String,
    /// Application client secret
    pub client_secret: String,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token exchange endpoint URL
    pub token_url: String,
    /// REST API base URL (no trailing slash)
    pub api_base_url: String,
    /// Scopes requested during authorization
    pub scopes: Vec<String>,
}

impl Default for StravaConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: "https://www.strava.com/oauth/authorize".to_string(),
            token_url: "https://www.strava.com/oauth/token".to_string(),
            api_base_url: "https://www.strava.com/api/v3".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl StravaConfig {
    /// Create a new config builder
    pub fn builder() -> StravaConfigBuilder {
        StravaConfigBuilder::default()
    }
}

/// Builder for StravaConfig
#[derive(Debug, Clone, Default)]
pub struct StravaConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_url: Option<String>,
    token_url: Option<String>,
    api_base_url: Option<String>,
    scopes: Option<Vec<String>>,
}

impl StravaConfigBuilder {
    /// Set the OAuth client ID
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the OAuth client secret
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the authorization endpoint URL
    pub fn auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self
    }

    /// Set the token exchange endpoint URL
    pub fn token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    /// Set the REST API base URL
    pub fn api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(api_base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Replace the requested scopes
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Build the StravaConfig
    pub fn build(self) -> StravaConfig {
        let defaults = StravaConfig::default();
        StravaConfig {
            client_id: self.client_id.unwrap_or(defaults.client_id),
            client_secret: self.client_secret.unwrap_or(defaults.client_secret),
            auth_url: self.auth_url.unwrap_or(defaults.auth_url),
            token_url: self.token_url.unwrap_or(defaults.token_url),
            api_base_url: self.api_base_url.unwrap_or(defaults.api_base_url),
            scopes: self.scopes.unwrap_or(defaults.scopes),
        }
    }
}

/// Token response from the Strava token endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<u64>,
    pub expires_in: Option<u64>,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        // Strava sends both; expires_at is authoritative.
        let expires_at = response
            .expires_at
            .unwrap_or_else(|| unix_now() + response.expires_in.unwrap_or(21_600));

        TokenSet {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }
}

/// Generate a random state string for CSRF protection
pub(crate) fn generate_random_state() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
