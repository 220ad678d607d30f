//! Startup configuration, built once from the credentials file and passed
//! explicitly to each component.

use std::env;
use std::path::{Path, PathBuf};

use crate::credentials::{CLIENT_ID_KEY, CLIENT_SECRET_KEY, Credentials};
use crate::{ActivityStore, Result, StravaConfig, SyncError, TokenStore};

pub const DEFAULT_CREDENTIALS_PATH: &str = ".env";
pub const DEFAULT_ACTIVITIES_PATH: &str = "activities.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Key=value file holding client credentials and tokens
    pub credentials_path: PathBuf,
    /// JSON archive of activities
    pub activities_path: PathBuf,
    pub strava: StravaConfig,
}

impl AppConfig {
    /// Read client credentials from the credentials file
    ///
    /// `CLIENT_ID` and `CLIENT_SECRET` set in the process environment take
    /// precedence over the file, matching the usual `.env` convention.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if either value is missing or
    /// the file cannot be read.
    pub fn load(credentials_path: impl Into<PathBuf>, activities_path: impl Into<PathBuf>) -> Result<Self> {
        let credentials_path = credentials_path.into();
        let credentials = TokenStore::new(&credentials_path).read()?;
        Self::from_credentials(credentials_path, activities_path.into(), &credentials, |key| {
            env::var(key).ok()
        })
    }

    fn from_credentials<F>(
        credentials_path: PathBuf,
        activities_path: PathBuf,
        credentials: &Credentials,
        env_lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |key: &str| -> Result<String> {
            env_lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or_else(|| credentials.get(key).map(str::to_string))
                .ok_or_else(|| missing(key, &credentials_path))
        };

        let strava = StravaConfig::builder()
            .client_id(resolve(CLIENT_ID_KEY)?)
            .client_secret(resolve(CLIENT_SECRET_KEY)?)
            .build();

        Ok(Self {
            credentials_path,
            activities_path,
            strava,
        })
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(&self.credentials_path)
    }

    pub fn activity_store(&self) -> ActivityStore {
        ActivityStore::new(&self.activities_path)
    }
}

fn missing(key: &str, path: &Path) -> SyncError {
    SyncError::Configuration(format!(
        "missing {} in {} (create an application at https://www.strava.com/settings/api)",
        key,
        path.display()
    ))
}
