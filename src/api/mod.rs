use crate::{
    api::handlers::{health, root},
    auth::{AuthConfig, AuthState, PgCredentials},
    store::{ConnectionExecutor, TransactionSequencer},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, options},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

#[cfg(test)]
mod tests;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Pool and server settings taken from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: String,
    pub max_connections: u32,
    pub auth: AuthConfig,
}

/// Assemble the full application around shared auth state and a pool.
///
/// The pool backs the read handlers, the transaction sequencer and the
/// connection executor alike.
#[must_use]
pub fn app(auth_state: Arc<AuthState>, pool: PgPool) -> Router {
    // Build the router from OpenAPI-wired routes, then extend it with non-doc routes like `/`.
    let (router, _openapi) = router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state))
                .layer(Extension(TransactionSequencer::new(pool.clone())))
                .layer(Extension(ConnectionExecutor::new(pool.clone())))
                .layer(Extension(pool)),
        )
}

/// Start the server
/// # Errors
/// Return error if the database is unreachable or the listener fails
pub async fn new(config: ServerConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&config.dsn)
        .await
        .context("Failed to connect to database")?;

    let credentials = Arc::new(PgCredentials::new(pool.clone()));
    let auth_state = Arc::new(AuthState::new(config.auth, credentials));
    info!(
        scope = %auth_state.config().session_scope(),
        max_period = ?auth_state.config().session_max_period(),
        "Session store ready"
    );

    let app = app(auth_state, pool);
    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
