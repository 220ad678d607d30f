use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::TokenResponse;
use crate::{Result, StravaActivity, StravaConfig, SyncError, TokenSet};

/// The slice of the Strava API this tool depends on
///
/// [`StravaClient`] is the real implementation. The authorization flow,
/// token refresher and sync run only see this trait, which keeps them
/// testable without network access.
pub trait StravaApi {
    /// Build the consent page URL the operator opens in a browser
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String>;

    /// Exchange an authorization code for an initial token pair
    fn exchange_code(&self, code: &str) -> Result<TokenSet>;

    /// Exchange a refresh token for a fresh token pair
    fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet>;

    /// Fetch up to `limit` of the athlete's most recent activities, newest first
    fn list_activities(&self, access_token: &str, limit: u32) -> Result<Vec<StravaActivity>>;
}

/// Blocking Strava API client
///
/// # Example
///
/// ```no_run
/// use strava_activity_sync::{StravaApi, StravaClient, StravaConfig};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = StravaConfig::builder()
///         .client_id("12345")
///         .client_secret("secret")
///         .build();
///     let client = StravaClient::new(config)?;
///
///     let tokens = client.refresh_token("stored-refresh-token")?;
///     let activities = client.list_activities(&tokens.access_token, 30)?;
///     println!("Fetched {} activities", activities.len());
///     Ok(())
/// }
/// ```
pub struct StravaClient {
    config: StravaConfig,
    http: Client,
}

impl StravaClient {
    /// Create a new client with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (e.g. TLS
    /// backend initialisation fails)
    pub fn new(config: StravaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self { config, http })
    }

    fn post_token(&self, params: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self.http.post(&self.config.token_url).form(params).send()?;
        let token_response: TokenResponse = check_response_json(response)?;
        Ok(TokenSet::from(token_response))
    }
}

impl StravaApi for StravaClient {
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("approval_prompt", "auto")
            .append_pair("scope", &self.config.scopes.join(","))
            .append_pair("state", state);
        Ok(url.to_string())
    }

    fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        self.post_token(&params)
            .map_err(|e| SyncError::TokenExchange(e.to_string()))
    }

    fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.post_token(&params)
            .map_err(|e| SyncError::TokenRefresh(e.to_string()))
    }

    fn list_activities(&self, access_token: &str, limit: u32) -> Result<Vec<StravaActivity>> {
        let url = format!("{}/athlete/activities", self.config.api_base_url);

        let fetch = || -> Result<Vec<StravaActivity>> {
            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[("per_page", limit.to_string()), ("page", "1".to_string())])
                .send()?;
            check_response_json(response)
        };
        fetch().map_err(|e| SyncError::Fetch(e.to_string()))
    }
}

/// Check response status and parse the JSON body
fn check_response_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();

        match status.as_u16() {
            401 => tracing::warn!("Strava rejected the credentials (401)"),
            429 => tracing::warn!("Strava rate limit hit (429)"),
            _ => {}
        }
        return Err(SyncError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text()?;
    Ok(serde_json::from_str(&body)?)
}
