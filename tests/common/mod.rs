//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::Read;
use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::{Value, json};
use strava_activity_sync::{
    ActivityStore, Result, StravaActivity, StravaApi, SyncError, TokenSet, TokenStore,
};
use tempfile::TempDir;
use url::Url;

pub const CREDENTIALS: &str = "\
# Strava application
CLIENT_ID=12345
CLIENT_SECRET=shh
ACCESS_TOKEN=stale-access
REFRESH_TOKEN=stored-refresh
";

/// In-memory stand-in for the Strava API
#[derive(Default)]
pub struct FakeStrava {
    pub activities: Vec<Value>,
    pub fail_refresh: bool,
    pub fail_fetch: bool,
    pub refresh_calls: Cell<u32>,
    pub refreshed_with: RefCell<Vec<String>>,
    pub fetch_limits: RefCell<Vec<u32>>,
    pub exchanged_codes: RefCell<Vec<String>>,
}

impl FakeStrava {
    pub fn with_activities(activities: Vec<Value>) -> Self {
        Self {
            activities,
            ..Self::default()
        }
    }
}

impl StravaApi for FakeStrava {
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse("https://strava.test/oauth/authorize")?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state);
        Ok(url.to_string())
    }

    fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        self.exchanged_codes.borrow_mut().push(code.to_string());
        Ok(TokenSet {
            access_token: format!("access-for-{}", code),
            refresh_token: "refresh-from-exchange".to_string(),
            expires_at: u64::MAX / 2,
        })
    }

    fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        self.refresh_calls.set(self.refresh_calls.get() + 1);
        self.refreshed_with
            .borrow_mut()
            .push(refresh_token.to_string());
        if self.fail_refresh {
            return Err(SyncError::TokenRefresh(
                "HTTP error: 400: {\"message\":\"Bad Request\",\"errors\":[{\"code\":\"invalid\"}]}"
                    .to_string(),
            ));
        }
        Ok(TokenSet {
            access_token: "fresh-access".to_string(),
            refresh_token: "rotated-refresh".to_string(),
            expires_at: u64::MAX / 2,
        })
    }

    fn list_activities(&self, _access_token: &str, limit: u32) -> Result<Vec<StravaActivity>> {
        self.fetch_limits.borrow_mut().push(limit);
        if self.fail_fetch {
            return Err(SyncError::Fetch("HTTP error: 500: upstream".to_string()));
        }
        Ok(self
            .activities
            .iter()
            .take(limit as usize)
            .cloned()
            .map(StravaActivity::from)
            .collect())
    }
}

/// Minimal Strava summary activity
pub fn activity(id: i64, start_date_local: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "start_date_local": start_date_local,
        "type": "Run",
        "distance": 5000.0,
        "moving_time": 1500,
        "elapsed_time": 1560,
        "average_heartrate": 150.5,
        "kudos_count": 2
    })
}

/// Scratch directory with a credentials file and an (absent) activities file
pub struct Workspace {
    pub dir: TempDir,
    pub tokens: TokenStore,
    pub store: ActivityStore,
}

impl Workspace {
    pub fn new(credentials: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let credentials_path = dir.path().join(".env");
        fs::write(&credentials_path, credentials).unwrap();
        Self {
            tokens: TokenStore::new(&credentials_path),
            store: ActivityStore::new(dir.path().join("activities.json")),
            dir,
        }
    }

    pub fn activities_path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    pub fn read_activities(&self) -> Option<String> {
        fs::read_to_string(self.store.path()).ok()
    }

    pub fn read_credentials(&self) -> String {
        fs::read_to_string(self.tokens.path()).unwrap()
    }

    pub fn stored_ids(&self) -> Vec<i64> {
        self.store
            .try_load()
            .unwrap()
            .iter()
            .map(|r| r.id().unwrap())
            .collect()
    }
}

/// Request captured by [`MockHttp`]
#[derive(Debug)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Canned-response HTTP server on an ephemeral port
pub struct MockHttp {
    pub base_url: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl MockHttp {
    /// Answer one request per entry in `responses`, in order
    pub fn serve(responses: Vec<(u16, String)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();

        let handle = std::thread::spawn(move || {
            let mut recorded = Vec::new();
            for (status, body) in responses {
                let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(10)) else {
                    break;
                };
                let mut request_body = String::new();
                request.as_reader().read_to_string(&mut request_body).unwrap();
                recorded.push(Recorded {
                    method: request.method().as_str().to_string(),
                    url: request.url().to_string(),
                    authorization: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.as_str().to_string()),
                    body: request_body,
                });

                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"application/json"[..],
                )
                .unwrap();
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                request.respond(response).unwrap();
            }
            recorded
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            handle,
        }
    }

    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().unwrap()
    }
}

/// The address the callback server binds for `port`
pub fn localhost(port: u16) -> std::net::SocketAddr {
    ("localhost", port).to_socket_addrs().unwrap().next().unwrap()
}

/// Poll until `port` can be bound again
pub fn port_is_free(port: u16) -> bool {
    for _ in 0..100 {
        if std::net::TcpListener::bind(localhost(port)).is_ok() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}
