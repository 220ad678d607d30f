use crate::{Result, StravaApi, SyncError, TokenStore};

/// Obtains a fresh access token at the start of each sync run
///
/// Exactly one refresh attempt is made per call. The rotated token pair is
/// written back to the credentials file before the access token is returned.
pub struct TokenRefresher<'a, A: StravaApi + ?Sized> {
    api: &'a A,
    store: &'a TokenStore,
}

impl<'a, A: StravaApi + ?Sized> TokenRefresher<'a, A> {
    pub fn new(api: &'a A, store: &'a TokenStore) -> Self {
        Self { api, store }
    }

    /// Refresh and persist the token pair, returning the new access token
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingRefreshToken`] if the credentials file has no
    ///   `REFRESH_TOKEN`; the authorization flow must be run first
    /// - [`SyncError::TokenRefresh`] if Strava rejects the exchange
    pub fn get_valid_access_token(&self) -> Result<String> {
        let credentials = self.store.read()?;
        let Some(refresh_token) = credentials.refresh_token() else {
            tracing::error!(
                path = %self.store.path().display(),
                "No refresh token found. Run `strava-sync authorize` to perform the initial authorization"
            );
            return Err(SyncError::MissingRefreshToken);
        };

        tracing::info!("Attempting to refresh access token...");
        let tokens = self
            .api
            .refresh_token(refresh_token)
            .map_err(|e| match e {
                SyncError::TokenRefresh(_) => e,
                other => SyncError::TokenRefresh(other.to_string()),
            })?;

        self.store.update(&tokens)?;
        tracing::info!(
            expires_in_secs = tokens.expires_in().as_secs(),
            "Successfully refreshed access token"
        );
        Ok(tokens.access_token)
    }
}
