//! Route handlers and the helpers they share.
//!
//! Every write handler calls [`SessionStore::authorized`] before touching the
//! store, then goes through the [`TransactionSequencer`] (dependent inserts)
//! or the [`ConnectionExecutor`] (single atomic statements).
//!
//! [`SessionStore::authorized`]: crate::auth::SessionStore::authorized
//! [`TransactionSequencer`]: crate::store::TransactionSequencer
//! [`ConnectionExecutor`]: crate::store::ConnectionExecutor

pub mod blog;
mod content;
pub mod health;
pub mod login;
pub mod pages;
pub mod root;
pub mod types;

use crate::{auth::AuthState, context::RequestContext, error::ApiError};
use anyhow::{Context, anyhow};
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
};
use std::future::Future;
use tracing::debug;

/// Unwrap a JSON body, turning any rejection into a 400.
pub(crate) fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            debug!("Rejected request body: {rejection}");
            Err(ApiError::Validation(rejection.body_text()))
        }
    }
}

pub(crate) fn query_rejection(rejection: &QueryRejection) -> ApiError {
    debug!("Rejected query string: {rejection}");
    ApiError::Validation(rejection.body_text())
}

/// Parse a decimal resource identifier.
pub(crate) fn parse_id(value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::Validation(format!("invalid id: {value:?}")))
}

/// Session guard shared by every write endpoint.
pub(crate) fn authorize(
    auth_state: &AuthState,
    ctx: &RequestContext,
    username: &str,
    secret: &str,
) -> Result<(), ApiError> {
    auth_state
        .sessions()
        .authorized(ctx.origin(), username, secret)
        .map_err(ApiError::from)
}

/// Run a read query under the request deadline.
pub(crate) async fn read<T, F>(ctx: &RequestContext, what: &str, query: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match ctx.bounded(query).await {
        Ok(result) => Ok(result.with_context(|| format!("failed to {what}"))?),
        Err(_) => Err(ApiError::Infrastructure(anyhow!(
            "{what} exceeded the request deadline"
        ))),
    }
}
