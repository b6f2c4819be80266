//! Login and logout.
//!
//! Flow for `POST /login`: reject penalised origins with 429 before any
//! credential work, verify the passphrase, then clear the origin's penalty on
//! success or set it on failure. Infrastructure failures leave the penalty
//! untouched.

use super::{
    authorize, json_payload,
    types::{LoginRequest, LoginResponse, LogoutRequest, format_timestamp},
};
use crate::{
    auth::{AuthState, parse_period},
    context::RequestContext,
    error::{ApiError, ErrorResponse},
};
use anyhow::anyhow;
use axum::{Json, extract::Extension, extract::rejection::JsonRejection, http::StatusCode};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 400, description = "Malformed body or period", body = ErrorResponse),
        (status = 401, description = "Bad credentials", body = ErrorResponse),
        (status = 429, description = "Origin is penalised after a failed login", body = ErrorResponse),
        (status = 500, description = "Credential store unavailable", body = ErrorResponse)
    ),
    tag = "login"
)]
#[instrument(skip_all, fields(origin = %ctx.origin()))]
pub async fn login(
    ctx: RequestContext,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = json_payload(payload)?;
    let origin = ctx.origin();

    if auth_state.penalties().penalised(origin) {
        warn!("Login rejected for penalised origin");
        return Err(ApiError::Throttled);
    }

    let period = parse_period(&request.period)?;
    let verify = auth_state.verify_credentials(&request.userid, &request.passphrase);
    let attempt = auth_state
        .sessions()
        .authenticate(origin, &request.userid, period, verify);
    let session = ctx
        .bounded(attempt)
        .await
        .map_err(|_| anyhow!("login exceeded the request deadline"))??;

    let Some(session) = session else {
        auth_state.penalties().penalise(origin);
        warn!(userid = %request.userid, "Login failed, origin penalised");
        return Err(ApiError::Unauthorized);
    };

    auth_state.penalties().clear(origin);
    info!(userid = %session.identity, "Login succeeded");
    Ok(Json(LoginResponse {
        secret: session.secret,
        expiration: format_timestamp(session.expiration),
    }))
}

#[utoipa::path(
    delete,
    path = "/login",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Session removed"),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "No matching session", body = ErrorResponse)
    ),
    tag = "login"
)]
#[instrument(skip_all, fields(origin = %ctx.origin()))]
pub async fn logout(
    ctx: RequestContext,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let request = json_payload(payload)?;
    authorize(&auth_state, &ctx, &request.username, &request.secret)?;
    auth_state
        .sessions()
        .invalidate(ctx.origin(), &request.username);
    Ok(StatusCode::NO_CONTENT)
}
