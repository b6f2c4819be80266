//! `/health`: database-aware status with an `X-App` identification header.

use crate::api::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tokio::time::{Duration, timeout};
use tracing::{Instrument, debug, error, info_span, warn};
use utoipa::ToSchema;

const HEALTH_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

impl Health {
    fn new(db_healthy: bool) -> Self {
        Self {
            commit: GIT_COMMIT_HASH.to_string(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: if db_healthy { "ok" } else { "error" }.to_string(),
        }
    }

    fn x_app(&self) -> HeaderMap {
        let short_hash = self.commit.get(..7).unwrap_or_default();
        let mut headers = HeaderMap::new();
        match format!("{}:{}:{short_hash}", self.name, self.version).parse::<HeaderValue>() {
            Ok(value) => {
                headers.insert("X-App", value);
            }
            Err(err) => debug!("Failed to parse X-App header: {err}"),
        }
        headers
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health",
)]
/// Report service identity and database reachability.
///
/// `HEAD` and `OPTIONS` get the same status and headers with an empty body.
pub async fn health(method: Method, pool: Extension<PgPool>) -> impl IntoResponse {
    let db_healthy = ping(&pool).await;
    let health = Health::new(db_healthy);
    let headers = health.x_app();

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, headers, body)
}

async fn ping(pool: &PgPool) -> bool {
    let acquire_span = info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );
    let check = async {
        match pool.acquire().instrument(acquire_span).await {
            Ok(mut conn) => {
                let ping_span =
                    info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
                match conn.ping().instrument(ping_span).await {
                    Ok(()) => true,
                    Err(err) => {
                        error!("Failed to ping database: {err}");
                        false
                    }
                }
            }
            Err(err) => {
                error!("Failed to acquire database connection: {err}");
                false
            }
        }
    };

    if let Ok(healthy) = timeout(Duration::from_secs(HEALTH_DB_TIMEOUT_SECONDS), check).await {
        healthy
    } else {
        warn!("Database health check timed out");
        false
    }
}
