//! Router-level tests: requests go through the full layer stack with an
//! in-memory credential source and a pool that never connects.

use super::app;
use crate::auth::{
    AuthConfig, AuthState, credential::cheap_verifier, storage::memory::MemoryCredentials,
};
use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use chrono::{NaiveDateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

const USER: &str = "editor";
const PASSPHRASE: &str = "correct horse battery staple";

struct Harness {
    app: Router,
    credentials: Arc<MemoryCredentials>,
    state: Arc<AuthState>,
}

impl Harness {
    fn new() -> Result<Self> {
        let verifier = cheap_verifier();
        let credentials =
            Arc::new(MemoryCredentials::default().with_user(&verifier, USER, PASSPHRASE)?);
        let config = AuthConfig::new()
            .with_trust_proxy_headers(true)
            .with_request_timeout(Duration::from_secs(2));
        let state = Arc::new(AuthState::new(config, credentials.clone()).with_verifier(verifier));
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://folio@127.0.0.1:1/folio")?;
        Ok(Self {
            app: app(state.clone(), pool),
            credentials,
            state,
        })
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        origin: &str,
        body: Option<String>,
    ) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", origin)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, Body::from))?;
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok((status, value))
    }

    async fn login(&self, origin: &str, passphrase: &str, period: &str) -> Result<(StatusCode, Value)> {
        let body = json!({"userid": USER, "passphrase": passphrase, "period": period});
        self.send(Method::POST, "/login", origin, Some(body.to_string()))
            .await
    }

    async fn secret(&self, origin: &str) -> Result<String> {
        let (status, body) = self.login(origin, PASSPHRASE, "1h").await?;
        assert_eq!(status, StatusCode::OK);
        body["secret"]
            .as_str()
            .map(str::to_string)
            .context("login response has no secret")
    }
}

#[tokio::test]
async fn login_issues_session_for_requested_period() -> Result<()> {
    let harness = Harness::new()?;
    let before = Utc::now().naive_utc();
    let (status, body) = harness.login("10.0.0.1", PASSPHRASE, "1h").await?;
    assert_eq!(status, StatusCode::OK);

    let secret = body["secret"].as_str().unwrap_or_default();
    assert_eq!(secret.len(), 64);
    assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));

    let expiration = NaiveDateTime::parse_from_str(
        body["expiration"].as_str().unwrap_or_default(),
        "%Y-%m-%d %H:%M:%S",
    )?;
    let expected = before + TimeDelta::hours(1);
    assert!((expiration - expected).num_seconds().abs() <= 5);
    assert!(!harness.state.penalties().penalised("10.0.0.1"));
    Ok(())
}

#[tokio::test]
async fn failed_login_penalises_origin_before_next_lookup() -> Result<()> {
    let harness = Harness::new()?;

    let (status, _) = harness.login("10.0.0.2", "wrong", "1h").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(harness.credentials.lookups(), 1);

    for _ in 0..2 {
        let (status, _) = harness.login("10.0.0.2", PASSPHRASE, "1h").await?;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
    assert_eq!(harness.credentials.lookups(), 1);

    // Other origins are unaffected.
    let (status, _) = harness.login("10.0.0.3", PASSPHRASE, "1h").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn cleared_origin_can_log_in_again() -> Result<()> {
    let harness = Harness::new()?;
    let (status, _) = harness.login("10.0.0.4", "wrong", "30m").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    harness.state.penalties().clear("10.0.0.4");
    let (status, _) = harness.login("10.0.0.4", PASSPHRASE, "30m").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!harness.state.penalties().penalised("10.0.0.4"));
    Ok(())
}

#[tokio::test]
async fn store_failure_is_500_and_leaves_origin_unpenalised() -> Result<()> {
    let harness = Harness::new()?;
    harness.credentials.fail(true);
    let (status, body) = harness.login("10.0.0.5", PASSPHRASE, "1h").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal server error");
    assert!(!harness.state.penalties().penalised("10.0.0.5"));
    Ok(())
}

#[tokio::test]
async fn malformed_login_requests_are_400() -> Result<()> {
    let harness = Harness::new()?;
    for period in ["", "soon", "10q", "0"] {
        let (status, _) = harness.login("10.0.0.6", PASSPHRASE, period).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "period {period:?}");
    }

    let (status, _) = harness
        .send(Method::POST, "/login", "10.0.0.6", Some("{not json".to_string()))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!harness.state.penalties().penalised("10.0.0.6"));
    assert_eq!(harness.credentials.lookups(), 0);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_session_for_writes() -> Result<()> {
    let harness = Harness::new()?;
    let secret = harness.secret("10.0.0.7").await?;

    let logout = json!({"username": USER, "secret": secret});
    let (status, _) = harness
        .send(Method::DELETE, "/login", "10.0.0.7", Some(logout.to_string()))
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let write = json!({
        "username": USER,
        "secret": secret,
        "data": {"title": "t", "subtitle": "s", "tag": "x", "body": "b"}
    });
    let (status, _) = harness
        .send(Method::POST, "/blog", "10.0.0.7", Some(write.to_string()))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = harness
        .send(Method::DELETE, "/login", "10.0.0.7", Some(logout.to_string()))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn session_is_bound_to_origin() -> Result<()> {
    let harness = Harness::new()?;
    let secret = harness.secret("10.0.0.8").await?;
    let write = json!({
        "username": USER,
        "secret": secret,
        "data": {"name": "about", "body": "hello"}
    });
    let (status, _) = harness
        .send(Method::POST, "/static", "10.0.0.9", Some(write.to_string()))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn guarded_writes_reject_bad_secrets() -> Result<()> {
    let harness = Harness::new()?;
    let cases = [
        (Method::POST, "/blog", json!({"title": "t", "subtitle": "s", "tag": "x", "body": "b"})),
        (Method::PUT, "/blog", json!({"id": "1", "title": "t", "subtitle": "s", "tag": "x", "body": "b"})),
        (Method::DELETE, "/blog", json!({"id": "1"})),
        (Method::POST, "/static", json!({"name": "about", "body": "b"})),
    ];
    for (method, uri, data) in cases {
        let body = json!({"username": USER, "secret": "00", "data": data});
        let (status, response) = harness
            .send(method.clone(), uri, "10.0.0.10", Some(body.to_string()))
            .await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(response["error"], "unauthorized");
    }
    Ok(())
}

#[tokio::test]
async fn invalid_read_parameters_are_400() -> Result<()> {
    let harness = Harness::new()?;
    for uri in ["/blog?id=abc", "/blog?id=-3", "/blog", "/static/.hidden"] {
        let (status, _) = harness.send(Method::GET, uri, "10.0.0.11", None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn responses_carry_request_id() -> Result<()> {
    let harness = Harness::new()?;
    let request = Request::builder()
        .uri("/")
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let response = harness.app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-123")
    );
    Ok(())
}
