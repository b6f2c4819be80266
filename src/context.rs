//! Request-scoped data threaded explicitly through handlers and the store.

use crate::auth::AuthState;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::{convert::Infallible, future::Future, net::SocketAddr, sync::Arc, time::Duration};
use tokio::time::{Instant, Timeout, timeout_at};

pub const UNKNOWN_ORIGIN: &str = "unknown";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller origin plus the deadline every piece of work for this request must
/// finish by.
#[derive(Clone, Debug)]
pub struct RequestContext {
    origin: String,
    deadline: Instant,
}

impl RequestContext {
    #[must_use]
    pub fn new(origin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            origin: origin.into(),
            deadline: Instant::now() + timeout,
        }
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Bound `future` by the request deadline. Dropping the future on expiry
    /// cancels any in-flight database work.
    pub fn bounded<F: Future>(&self, future: F) -> Timeout<F> {
        timeout_at(self.deadline, future)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (timeout, trust_proxy_headers) = parts
            .extensions
            .get::<Arc<AuthState>>()
            .map_or((DEFAULT_REQUEST_TIMEOUT, false), |state| {
                (
                    state.config().request_timeout(),
                    state.config().trust_proxy_headers(),
                )
            });

        let forwarded = if trust_proxy_headers {
            extract_client_ip(&parts.headers)
        } else {
            None
        };
        let origin = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());

        Ok(Self::new(origin, timeout))
    }
}

/// Client IP from common proxy headers, first `x-forwarded-for` hop wins.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
