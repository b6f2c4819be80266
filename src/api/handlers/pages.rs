//! Static pages served under `/static/{name}`.
//!
//! Pages are indexed by the MD5 digest of their name, so lookups do not depend
//! on name length or collation.

use super::{
    authorize,
    content::{InsertContent, content_id},
    json_payload, read,
    types::{AuthData, StaticPage, StaticPageCreate, StaticPageCreated, format_timestamp},
};
use crate::{
    auth::AuthState,
    context::RequestContext,
    error::{ApiError, ErrorResponse},
    store::{Sequence, Step, StepError, StepOutcome, TransactionSequencer},
};
use async_trait::async_trait;
use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, instrument};

/// One path segment of URL-safe characters.
pub(crate) fn valid_page_name(name: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._~-]{0,127}$").is_ok_and(|regex| regex.is_match(name))
}

fn checked_name(name: &str) -> Result<&str, ApiError> {
    if valid_page_name(name) {
        Ok(name)
    } else {
        Err(ApiError::Validation(format!("invalid page name: {name:?}")))
    }
}

#[utoipa::path(
    get,
    path = "/static/{name}",
    params(("name" = String, Path, description = "Page name")),
    responses(
        (status = 200, description = "Page content", body = StaticPage),
        (status = 400, description = "Invalid page name", body = ErrorResponse),
        (status = 404, description = "No such page", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "static"
)]
#[instrument(skip(ctx, pool))]
pub async fn get(
    ctx: RequestContext,
    pool: Extension<PgPool>,
    Path(name): Path<String>,
) -> Result<Json<StaticPage>, ApiError> {
    let name = checked_name(&name)?;
    let query = r"
        SELECT a.body, a.created, a.updated
        FROM page_content AS a
        INNER JOIN static_pages AS b ON a.id = b.content_id
        WHERE b.url_hash = decode(md5($1), 'hex')
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = read(
        &ctx,
        "load static page",
        sqlx::query(query)
            .bind(name)
            .fetch_optional(&*pool)
            .instrument(span),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("page {name} not found")))?;

    let page = decode_page(&row)
        .map_err(|err| anyhow::Error::new(err).context("failed to decode static page"))?;
    Ok(Json(page))
}

fn decode_page(row: &sqlx::postgres::PgRow) -> Result<StaticPage, sqlx::Error> {
    let created: DateTime<Utc> = row.try_get("created")?;
    let updated: DateTime<Utc> = row.try_get("updated")?;
    Ok(StaticPage {
        body: row.try_get("body")?,
        created: format_timestamp(created),
        updated: format_timestamp(updated),
    })
}

/// Index row for a static page, pointing at the content inserted before it.
struct InsertPageIndex {
    name: String,
}

#[async_trait]
impl Step<Postgres> for InsertPageIndex {
    async fn apply(
        &self,
        prior: StepOutcome,
        conn: &mut PgConnection,
    ) -> Result<StepOutcome, StepError> {
        let content_id = content_id(prior)?;
        let query = "INSERT INTO static_pages (url_hash, content_id) VALUES (decode(md5($1), 'hex'), $2) RETURNING id";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let id: i64 = sqlx::query_scalar(query)
            .bind(&self.name)
            .bind(content_id)
            .fetch_one(&mut *conn)
            .instrument(span)
            .await?;
        Ok(StepOutcome::inserted(id))
    }
}

#[utoipa::path(
    post,
    path = "/static",
    request_body = AuthData<StaticPageCreate>,
    responses(
        (status = 200, description = "Page created", body = StaticPageCreated),
        (status = 400, description = "Malformed body or page name", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 409, description = "A page with this name already exists", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "static"
)]
#[instrument(skip_all, fields(origin = %ctx.origin()))]
pub async fn create(
    ctx: RequestContext,
    auth_state: Extension<Arc<AuthState>>,
    sequencer: Extension<TransactionSequencer<Postgres>>,
    payload: Result<Json<AuthData<StaticPageCreate>>, JsonRejection>,
) -> Result<Json<StaticPageCreated>, ApiError> {
    let request = json_payload(payload)?;
    authorize(&auth_state, &ctx, &request.username, &request.secret)?;

    let page = request.data;
    checked_name(&page.name)?;
    let now = Utc::now();
    let sequence = Sequence::new()
        .then(InsertContent {
            body: page.body.clone(),
            at: now,
        })
        .then(InsertPageIndex {
            name: page.name.clone(),
        });

    sequencer.run(&ctx, &sequence).await?;
    info!(name = %page.name, "Static page created");

    Ok(Json(StaticPageCreated {
        name: page.name,
        body: page.body,
        created: format_timestamp(now),
        updated: format_timestamp(now),
    }))
}
