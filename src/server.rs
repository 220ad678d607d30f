use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Header, Request, Response, Server};
use url::Url;

use crate::{Result, SyncError};

const SUCCESS_PAGE: &str = r#"
<html>
    <head><title>Authorization Successful</title></head>
    <body>
        <h1>Authorization successful!</h1>
        <p>You can close this window and return to the terminal.</p>
    </body>
</html>
"#;

const DENIED_PAGE: &str = r#"
<html>
    <head><title>Authorization Denied</title></head>
    <body>
        <h1>Authorization denied</h1>
        <p>Strava did not grant access. You can close this window.</p>
    </body>
</html>
"#;

const STATE_MISMATCH_PAGE: &str = r#"
<html>
    <head><title>Authorization Failed</title></head>
    <body>
        <h1>Authorization failed</h1>
        <p>Security validation failed. Please start the authorization again.</p>
    </body>
</html>
"#;

/// Outcome of the OAuth redirect, forwarded to the waiting flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    /// The provider redirected back with an authorization code
    Code(String),
    /// The provider redirected back with `error=...`, e.g. `access_denied`
    Denied(String),
}

/// Local HTTP listener that captures the OAuth redirect
///
/// The listener runs on a background thread and hands at most one
/// [`CallbackEvent`] to the caller through a single-slot channel. Later
/// requests still get a page but their codes are dropped.
///
/// The listener is shut down and its port released when the value is
/// stopped or dropped, so every exit path of the flow tears it down.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use strava_activity_sync::CallbackServer;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let server = CallbackServer::start(8000, Some("expected-state".into()))?;
/// println!("Redirect URI: {}", server.redirect_uri());
/// let code = server.wait_for_code(Duration::from_secs(60))?;
/// server.stop();
/// # Ok(())
/// # }
/// ```
pub struct CallbackServer {
    server: Arc<Server>,
    port: u16,
    rx: Receiver<CallbackEvent>,
    shutting_down: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind the first address `localhost` resolves to and start serving on a
    /// background thread
    ///
    /// Port `0` picks an ephemeral port; see [`CallbackServer::port`].
    /// When `expected_state` is set, callbacks carrying a different `state`
    /// are answered but not forwarded.
    pub fn start(port: u16, expected_state: Option<String>) -> Result<Self> {
        let addr = localhost(port)?;
        let server = Server::http(addr).map_err(|e| {
            SyncError::CallbackServer(format!("Failed to bind to {}: {}", addr, e))
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .unwrap_or(port);

        let server = Arc::new(server);
        let shutting_down = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::sync_channel(1);

        let worker = {
            let server = Arc::clone(&server);
            let shutting_down = Arc::clone(&shutting_down);
            thread::Builder::new()
                .name("oauth-callback".to_string())
                .spawn(move || serve(&server, &tx, expected_state.as_deref(), &shutting_down))
                .map_err(|e| {
                    SyncError::CallbackServer(format!("Failed to spawn listener thread: {}", e))
                })?
        };

        tracing::info!(ip = %addr.ip(), port, "Started local authorization callback server");
        Ok(Self {
            server,
            port,
            rx,
            shutting_down,
            worker: Some(worker),
        })
    }

    /// The port actually bound
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI to register with the authorization request
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Block until the first callback arrives or `timeout` elapses
    ///
    /// # Errors
    ///
    /// - [`SyncError::AuthorizationTimeout`] if nothing arrived in time
    /// - [`SyncError::OAuth`] if the operator denied access
    pub fn wait_for_code(&self, timeout: Duration) -> Result<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(CallbackEvent::Code(code)) => Ok(code),
            Ok(CallbackEvent::Denied(error)) => Err(SyncError::OAuth(format!(
                "authorization was not granted: {}",
                error
            ))),
            Err(RecvTimeoutError::Timeout) => Err(SyncError::AuthorizationTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SyncError::CallbackServer(
                "Server shut down unexpectedly".to_string(),
            )),
        }
    }

    /// Shut the listener down and release the port
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shutting_down.store(true, Ordering::SeqCst);
        self.server.unblock();
        if worker.join().is_err() {
            tracing::warn!(port = self.port, "Callback server thread panicked");
        }
        tracing::debug!(port = self.port, "Stopped callback server");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn localhost(port: u16) -> Result<SocketAddr> {
    ("localhost", port)
        .to_socket_addrs()
        .map_err(|e| SyncError::CallbackServer(format!("Failed to resolve localhost: {}", e)))?
        .next()
        .ok_or_else(|| SyncError::CallbackServer("localhost did not resolve to an address".to_string()))
}

fn serve(
    server: &Server,
    tx: &SyncSender<CallbackEvent>,
    expected_state: Option<&str>,
    shutting_down: &AtomicBool,
) {
    loop {
        match server.recv() {
            Ok(request) => handle_request(request, tx, expected_state),
            Err(_) if shutting_down.load(Ordering::SeqCst) => break,
            Err(e) => tracing::warn!(error = %e, "Callback server failed to accept a request"),
        }
    }
}

fn handle_request(request: Request, tx: &SyncSender<CallbackEvent>, expected_state: Option<&str>) {
    let callback = parse_callback(request.url(), expected_state);
    tracing::debug!(path = %request.url().split('?').next().unwrap_or(""), "Callback request");

    let page = match &callback {
        Callback::Denied(_) => DENIED_PAGE,
        Callback::StateMismatch => {
            tracing::warn!("Ignoring callback with mismatched state");
            STATE_MISMATCH_PAGE
        }
        Callback::Code(_) | Callback::Empty => SUCCESS_PAGE,
    };

    let event = match callback {
        Callback::Code(code) => Some(CallbackEvent::Code(code)),
        Callback::Denied(error) => Some(CallbackEvent::Denied(error)),
        Callback::StateMismatch | Callback::Empty => None,
    };
    if let Some(event) = event {
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::debug!("Callback already received, ignoring"),
            Err(TrySendError::Disconnected(_)) => tracing::debug!("No one is waiting for a callback"),
        }
    }

    let mut response = Response::from_string(page);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        tracing::warn!(error = %e, "Failed to answer callback request");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    Empty,
}

fn parse_callback(path: &str, expected_state: Option<&str>) -> Callback {
    let Ok(url) = Url::parse(&format!("http://localhost{}", path)) else {
        return Callback::Empty;
    };

    let first = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };
    let code = first("code");
    let error = first("error");
    if code.is_none() && error.is_none() {
        return Callback::Empty;
    }

    if let Some(expected) = expected_state {
        if first("state").as_deref() != Some(expected) {
            return Callback::StateMismatch;
        }
    }

    match (code, error) {
        (_, Some(error)) => Callback::Denied(error),
        (Some(code), None) => Callback::Code(code),
        (None, None) => Callback::Empty,
    }
}
