use crate::{Result, SyncError};

/// Open a URL in the operator's default web browser
///
/// Used by the authorization flow to show the Strava consent page.
///
/// # Errors
///
/// Returns [`SyncError::BrowserLaunch`] if no browser could be launched,
/// e.g. on a headless machine.
///
/// # Example
///
/// ```no_run
/// use strava_activity_sync::{StravaClient, StravaConfig, StravaApi, open_browser};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = StravaClient::new(StravaConfig::builder().client_id("12345").build())?;
/// let url = client.authorization_url("http://localhost:8000", "state")?;
/// open_browser(&url)?;
/// # Ok(())
/// # }
/// ```
pub fn open_browser(url: &str) -> Result<()> {
    webbrowser::open(url).map_err(|e| SyncError::BrowserLaunch(e.to_string()))
}
