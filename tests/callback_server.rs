mod common;

use std::time::{Duration, Instant};

use common::{localhost, port_is_free};
use strava_activity_sync::{CallbackServer, SyncError};
use url::Url;

fn get(port: u16, query: &str) -> (u16, String) {
    let response = reqwest::blocking::get(format!("http://localhost:{}/{}", port, query)).unwrap();
    let status = response.status().as_u16();
    (status, response.text().unwrap())
}

#[test]
fn test_delivers_first_code() {
    let server = CallbackServer::start(0, None).unwrap();
    let port = server.port();
    assert_ne!(port, 0);
    assert_eq!(server.redirect_uri(), format!("http://localhost:{}", port));

    let (status, body) = get(port, "?state=&code=first-code&scope=read,activity:read_all");
    assert_eq!(status, 200);
    assert!(body.contains("Authorization successful"));

    // Accepted, but only the first code is handed over.
    let (status, _) = get(port, "?code=second-code");
    assert_eq!(status, 200);

    assert_eq!(
        server.wait_for_code(Duration::from_secs(5)).unwrap(),
        "first-code"
    );
    server.stop();
    assert!(port_is_free(port));
}

#[test]
fn test_redirect_uri_reaches_listener() {
    let server = CallbackServer::start(0, None).unwrap();
    let redirect = Url::parse(&server.redirect_uri()).unwrap();
    assert_eq!(redirect.host_str(), Some("localhost"));
    assert_eq!(
        redirect.socket_addrs(|| None).unwrap()[0],
        localhost(server.port())
    );

    let response = reqwest::blocking::get(format!("{}/?code=via-redirect", server.redirect_uri())).unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        server.wait_for_code(Duration::from_secs(5)).unwrap(),
        "via-redirect"
    );
}

#[test]
fn test_requests_without_code_signal_nothing() {
    let server = CallbackServer::start(0, Some("s".to_string())).unwrap();
    let port = server.port();

    let (status, _) = get(port, "favicon.ico");
    assert_eq!(status, 200);

    let err = server
        .wait_for_code(Duration::from_millis(200))
        .unwrap_err();
    assert!(matches!(err, SyncError::AuthorizationTimeout(_)));
}

#[test]
fn test_mismatched_state_is_ignored() {
    let server = CallbackServer::start(0, Some("expected".to_string())).unwrap();
    let port = server.port();

    let (status, body) = get(port, "?code=forged&state=other");
    assert_eq!(status, 200);
    assert!(body.contains("Authorization failed"));

    get(port, "?code=genuine&state=expected");
    assert_eq!(
        server.wait_for_code(Duration::from_secs(5)).unwrap(),
        "genuine"
    );
}

#[test]
fn test_denied_consent_fails_fast() {
    let server = CallbackServer::start(0, Some("s".to_string())).unwrap();
    let port = server.port();

    let (_, body) = get(port, "?state=s&error=access_denied");
    assert!(body.contains("Authorization denied"));

    let started = Instant::now();
    let err = server.wait_for_code(Duration::from_secs(30)).unwrap_err();
    assert!(matches!(err, SyncError::OAuth(ref msg) if msg.contains("access_denied")));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_timeout_then_drop_releases_port() {
    let port = {
        let server = CallbackServer::start(0, None).unwrap();
        let err = server
            .wait_for_code(Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, SyncError::AuthorizationTimeout(d) if d == Duration::from_millis(100)));
        server.port()
    };
    assert!(port_is_free(port));
}

#[test]
fn test_port_in_use_is_reported() {
    let first = CallbackServer::start(0, None).unwrap();
    let err = match CallbackServer::start(first.port(), None) {
        Ok(_) => panic!("second bind on the same port succeeded"),
        Err(e) => e,
    };
    assert!(matches!(err, SyncError::CallbackServer(_)));
}
