//! One-time browser consent flow that bootstraps the token pair.

use std::time::Duration;

use crate::types::{DEFAULT_CALLBACK_PORT, generate_random_state};
use crate::{CallbackServer, Result, StravaApi, TokenSet, TokenStore};

/// How long the flow waits for the browser to come back
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AuthorizationOptions {
    /// Local port for the redirect listener
    pub port: u16,
    /// Bounded wait for the authorization code
    pub timeout: Duration,
}

impl Default for AuthorizationOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_CALLBACK_PORT,
            timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
        }
    }
}

/// Drives the authorization-code flow end to end
///
/// 1. start a [`CallbackServer`] on the configured port
/// 2. build the consent URL with a redirect to that port
/// 3. hand the URL to the operator (browser)
/// 4. wait for the code, bounded by the timeout
/// 5. exchange the code for tokens
/// 6. persist the tokens through [`TokenStore::update`]
///
/// The listener is stopped on every exit path.
pub struct AuthorizationFlow<'a, A: StravaApi + ?Sized> {
    api: &'a A,
    store: &'a TokenStore,
    options: AuthorizationOptions,
}

impl<'a, A: StravaApi + ?Sized> AuthorizationFlow<'a, A> {
    pub fn new(api: &'a A, store: &'a TokenStore, options: AuthorizationOptions) -> Self {
        Self {
            api,
            store,
            options,
        }
    }

    /// Run the flow, opening the consent page in the default browser
    #[cfg(feature = "browser")]
    pub fn run(&self) -> Result<TokenSet> {
        self.run_with(|url| {
            tracing::info!("Opening browser for Strava authorization...");
            crate::open_browser(url)
        })
    }

    /// Run the flow, printing the consent URL for the operator to open
    #[cfg(not(feature = "browser"))]
    pub fn run(&self) -> Result<TokenSet> {
        self.run_with(print_url)
    }

    /// Run the flow with a custom way of presenting the consent URL
    ///
    /// If `launch` fails the URL is logged so the operator can open it by
    /// hand; the flow keeps waiting either way.
    pub fn run_with<F>(&self, launch: F) -> Result<TokenSet>
    where
        F: FnOnce(&str) -> Result<()>,
    {
        let state = generate_random_state();
        let server = CallbackServer::start(self.options.port, Some(state.clone()))?;

        let url = self.api.authorization_url(&server.redirect_uri(), &state)?;
        if let Err(e) = launch(url.as_str()) {
            tracing::warn!(error = %e, "Could not open a browser");
            print_url(&url)?;
        }

        tracing::info!(
            timeout_secs = self.options.timeout.as_secs(),
            "Waiting for authorization..."
        );
        let code = server.wait_for_code(self.options.timeout)?;
        tracing::info!("Authorization code received");
        server.stop();

        let tokens = self.api.exchange_code(&code)?;
        self.store.update(&tokens)?;
        tracing::info!(
            expires_in_secs = tokens.expires_in().as_secs(),
            "Successfully obtained and saved tokens"
        );
        Ok(tokens)
    }
}

fn print_url(url: &str) -> Result<()> {
    tracing::info!(%url, "Open this URL in a browser to authorize access");
    Ok(())
}
