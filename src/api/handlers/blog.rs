//! Blog posts: listing, reads, and authorized create/update/delete.

use super::{
    authorize,
    content::{InsertContent, content_id},
    json_payload, parse_id, query_rejection, read,
    types::{
        AuthData, Blog, BlogCreate, BlogDelete, BlogHeader, BlogUpdate, BlogUpdated,
        format_timestamp,
    },
};
use crate::{
    auth::AuthState,
    context::RequestContext,
    error::{ApiError, ErrorResponse},
    store::{
        ConnectionExecutor, Sequence, Step, StepError, StepOutcome, TransactionSequencer,
    },
};
use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    Json,
    extract::{
        Extension, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool, Postgres, Row, postgres::PgRow};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, instrument};
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams, Debug)]
pub struct BlogQuery {
    /// Blog identifier.
    id: String,
}

fn header_from_row(row: &PgRow) -> Result<BlogHeader, sqlx::Error> {
    Ok(BlogHeader {
        id: row.try_get::<i64, _>("id")?.to_string(),
        title: row.try_get("title")?,
        subtitle: row.try_get("subtitle")?,
        tag: row.try_get("tag")?,
        created: format_timestamp(row.try_get("created")?),
        updated: format_timestamp(row.try_get("updated")?),
    })
}

#[utoipa::path(
    get,
    path = "/blogs",
    responses(
        (status = 200, description = "All blog posts, oldest first", body = [BlogHeader]),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "blog"
)]
#[instrument(skip_all)]
pub async fn list(
    ctx: RequestContext,
    pool: Extension<PgPool>,
) -> Result<Json<Vec<BlogHeader>>, ApiError> {
    let query = r"
        SELECT a.id, a.title, a.subtitle, a.tag, b.created, b.updated
        FROM blog_pages AS a
        INNER JOIN page_content AS b ON a.content_id = b.id
        ORDER BY b.created, a.id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = read(
        &ctx,
        "list blogs",
        sqlx::query(query).fetch_all(&*pool).instrument(span),
    )
    .await?;

    let headers = rows
        .iter()
        .map(header_from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow::Error::new(err).context("failed to decode blog header"))?;
    Ok(Json(headers))
}

#[utoipa::path(
    get,
    path = "/blog",
    params(BlogQuery),
    responses(
        (status = 200, description = "Blog post", body = Blog),
        (status = 400, description = "Missing or non-numeric id", body = ErrorResponse),
        (status = 404, description = "No such blog post", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "blog"
)]
#[instrument(skip_all)]
pub async fn get(
    ctx: RequestContext,
    pool: Extension<PgPool>,
    query: Result<Query<BlogQuery>, QueryRejection>,
) -> Result<Json<Blog>, ApiError> {
    let Query(params) = query.map_err(|rejection| query_rejection(&rejection))?;
    let id = parse_id(&params.id)?;

    let query = r"
        SELECT a.id, a.title, a.subtitle, a.tag, b.body, b.created, b.updated
        FROM blog_pages AS a
        INNER JOIN page_content AS b ON a.content_id = b.id
        WHERE a.id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = read(
        &ctx,
        "load blog",
        sqlx::query(query)
            .bind(id)
            .fetch_optional(&*pool)
            .instrument(span),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("blog {id} not found")))?;

    let blog = header_from_row(&row)
        .and_then(|header| {
            Ok(Blog {
                body: row.try_get("body")?,
                id: header.id,
                title: header.title,
                subtitle: header.subtitle,
                tag: header.tag,
                created: header.created,
                updated: header.updated,
            })
        })
        .map_err(|err| anyhow::Error::new(err).context("failed to decode blog"))?;
    Ok(Json(blog))
}

/// Index row for a blog post, pointing at the content inserted before it.
struct InsertBlogIndex {
    title: String,
    subtitle: String,
    tag: String,
}

#[async_trait]
impl Step<Postgres> for InsertBlogIndex {
    async fn apply(
        &self,
        prior: StepOutcome,
        conn: &mut PgConnection,
    ) -> Result<StepOutcome, StepError> {
        let content_id = content_id(prior)?;
        let query = "INSERT INTO blog_pages (title, subtitle, tag, content_id) VALUES ($1, $2, $3, $4) RETURNING id";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let id: i64 = sqlx::query_scalar(query)
            .bind(&self.title)
            .bind(&self.subtitle)
            .bind(&self.tag)
            .bind(content_id)
            .fetch_one(&mut *conn)
            .instrument(span)
            .await?;
        Ok(StepOutcome::inserted(id))
    }
}

#[utoipa::path(
    post,
    path = "/blog",
    request_body = AuthData<BlogCreate>,
    responses(
        (status = 200, description = "Blog post created", body = Blog),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "blog"
)]
#[instrument(skip_all, fields(origin = %ctx.origin()))]
pub async fn create(
    ctx: RequestContext,
    auth_state: Extension<Arc<AuthState>>,
    sequencer: Extension<TransactionSequencer<Postgres>>,
    payload: Result<Json<AuthData<BlogCreate>>, JsonRejection>,
) -> Result<Json<Blog>, ApiError> {
    let request = json_payload(payload)?;
    authorize(&auth_state, &ctx, &request.username, &request.secret)?;

    let now = Utc::now();
    let post = request.data;
    let sequence = Sequence::new()
        .then(InsertContent {
            body: post.body.clone(),
            at: now,
        })
        .then(InsertBlogIndex {
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            tag: post.tag.clone(),
        });

    let outcome = sequencer.run(&ctx, &sequence).await?;
    let id = outcome
        .id
        .ok_or_else(|| anyhow!("blog insert returned no id"))?;
    info!(id, "Blog post created");

    Ok(Json(Blog {
        id: id.to_string(),
        title: post.title,
        subtitle: post.subtitle,
        tag: post.tag,
        body: post.body,
        created: format_timestamp(now),
        updated: format_timestamp(now),
    }))
}

/// Index and content updated by one statement.
struct UpdateBlog {
    id: i64,
    title: String,
    subtitle: String,
    tag: String,
    body: String,
    at: DateTime<Utc>,
}

#[async_trait]
impl Step<Postgres> for UpdateBlog {
    async fn apply(
        &self,
        _prior: StepOutcome,
        conn: &mut PgConnection,
    ) -> Result<StepOutcome, StepError> {
        let query = r"
            WITH idx AS (
                UPDATE blog_pages
                SET title = $2, subtitle = $3, tag = $4
                WHERE id = $1
                RETURNING content_id
            )
            UPDATE page_content
            SET body = $5, updated = $6
            FROM idx
            WHERE page_content.id = idx.content_id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(self.id)
            .bind(&self.title)
            .bind(&self.subtitle)
            .bind(&self.tag)
            .bind(&self.body)
            .bind(self.at)
            .execute(&mut *conn)
            .instrument(span)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StepError::NotFound(format!("blog {}", self.id)));
        }
        Ok(StepOutcome {
            id: Some(self.id),
            rows_affected: result.rows_affected(),
        })
    }
}

#[utoipa::path(
    put,
    path = "/blog",
    request_body = AuthData<BlogUpdate>,
    responses(
        (status = 200, description = "Blog post updated", body = BlogUpdated),
        (status = 400, description = "Malformed body or id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 404, description = "No such blog post", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "blog"
)]
#[instrument(skip_all, fields(origin = %ctx.origin()))]
pub async fn update(
    ctx: RequestContext,
    auth_state: Extension<Arc<AuthState>>,
    executor: Extension<ConnectionExecutor<Postgres>>,
    payload: Result<Json<AuthData<BlogUpdate>>, JsonRejection>,
) -> Result<Json<BlogUpdated>, ApiError> {
    let request = json_payload(payload)?;
    authorize(&auth_state, &ctx, &request.username, &request.secret)?;

    let post = request.data;
    let id = parse_id(&post.id)?;
    let step = UpdateBlog {
        id,
        title: post.title,
        subtitle: post.subtitle,
        tag: post.tag,
        body: post.body,
        at: Utc::now(),
    };
    executor.run(&ctx, &step).await?;
    info!(id, "Blog post updated");

    Ok(Json(BlogUpdated {
        id: id.to_string(),
        title: step.title,
        subtitle: step.subtitle,
        tag: step.tag,
        body: step.body,
        updated: format_timestamp(step.at),
    }))
}

/// Index row and its content removed by one statement.
struct DeleteBlog {
    id: i64,
}

#[async_trait]
impl Step<Postgres> for DeleteBlog {
    async fn apply(
        &self,
        _prior: StepOutcome,
        conn: &mut PgConnection,
    ) -> Result<StepOutcome, StepError> {
        let query = r"
            WITH gone AS (
                DELETE FROM blog_pages
                WHERE id = $1
                RETURNING content_id
            )
            DELETE FROM page_content
            USING gone
            WHERE page_content.id = gone.content_id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(self.id)
            .execute(&mut *conn)
            .instrument(span)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StepError::NotFound(format!("blog {}", self.id)));
        }
        Ok(StepOutcome::affected(result.rows_affected()))
    }
}

#[utoipa::path(
    delete,
    path = "/blog",
    request_body = AuthData<BlogDelete>,
    responses(
        (status = 204, description = "Blog post deleted"),
        (status = 400, description = "Malformed body or id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 404, description = "No such blog post", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "blog"
)]
#[instrument(skip_all, fields(origin = %ctx.origin()))]
pub async fn delete(
    ctx: RequestContext,
    auth_state: Extension<Arc<AuthState>>,
    executor: Extension<ConnectionExecutor<Postgres>>,
    payload: Result<Json<AuthData<BlogDelete>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let request = json_payload(payload)?;
    authorize(&auth_state, &ctx, &request.username, &request.secret)?;

    let id = parse_id(&request.data.id)?;
    executor.run(&ctx, &DeleteBlog { id }).await?;
    info!(id, "Blog post deleted");
    Ok(StatusCode::NO_CONTENT)
}
