//! # strava-activity-sync
//!
//! Keeps a local JSON archive of Strava activities up to date.
//!
//! Two operations make up the tool:
//!
//! - **Authorization** (once): a browser-based OAuth 2.0 authorization-code
//!   flow. A local callback listener captures the code, which is exchanged
//!   for an access/refresh token pair saved to a `.env`-style credentials
//!   file.
//! - **Sync** (scheduled, e.g. daily from cron): refreshes the access token,
//!   fetches the most recent activities, normalizes them and merges them
//!   into the archive by activity id, either incrementally or as a full
//!   replacement.
//!
//! ## Features
//!
//! - **Blocking API**: no async runtime; every call runs on the caller's thread
//! - **Callback Server**: local listener with a bounded wait and guaranteed teardown
//! - **Browser Integration**: auto-open the consent page (`browser`, default)
//! - **Lenient Normalization**: absent Strava fields default instead of failing
//!
//! ## Quick Start
//!
//! ```no_run
//! use strava_activity_sync::{
//!     ActivitySync, AppConfig, StravaClient, SyncMode, SyncOptions,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load(".env", "activities.json")?;
//!     let client = StravaClient::new(config.strava.clone())?;
//!     let tokens = config.token_store();
//!     let store = config.activity_store();
//!
//!     let outcome = ActivitySync::new(&client, &tokens, &store).run(&SyncOptions {
//!         mode: SyncMode::Incremental,
//!         ..SyncOptions::default()
//!     })?;
//!     println!("Added {} activities", outcome.added);
//!     Ok(())
//! }
//! ```

mod activity;
mod authorize;
mod client;
mod config;
pub mod credentials;
mod error;
mod refresh;
mod server;
pub mod store;
mod sync;
mod types;

#[cfg(feature = "browser")]
mod browser;

// Public API exports
pub use activity::{ActivityRecord, StravaActivity, normalize};
pub use authorize::{AuthorizationFlow, AuthorizationOptions, DEFAULT_AUTHORIZATION_TIMEOUT};
pub use client::{StravaApi, StravaClient};
pub use config::{AppConfig, DEFAULT_ACTIVITIES_PATH, DEFAULT_CREDENTIALS_PATH};
pub use credentials::{Credentials, TokenStore};
pub use error::{Result, SyncError};
pub use refresh::TokenRefresher;
pub use server::{CallbackEvent, CallbackServer};
pub use store::{ActivityStore, StoredActivity};
pub use sync::{
    ActivitySync, DEFAULT_LIMIT, MAX_LIMIT, SyncMode, SyncOptions, SyncOutcome, SyncState,
};
pub use types::{
    DEFAULT_CALLBACK_PORT, DEFAULT_SCOPES, StravaConfig, StravaConfigBuilder, TokenSet,
};

#[cfg(feature = "browser")]
pub use browser::open_browser;
