//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp the way every response body carries it.
pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIME_FORMAT).to_string()
}

/// Session proof wrapped around the payload of every write.
#[derive(Deserialize, ToSchema)]
pub struct AuthData<T> {
    pub username: String,
    pub secret: String,
    pub data: T,
}

impl<T: fmt::Debug> fmt::Debug for AuthData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthData")
            .field("username", &self.username)
            .field("secret", &"***")
            .field("data", &self.data)
            .finish()
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub userid: String,
    pub passphrase: String,
    /// Requested session length, e.g. `"1h"` or `"90m"`.
    pub period: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("userid", &self.userid)
            .field("passphrase", &"***")
            .field("period", &self.period)
            .finish()
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct LoginResponse {
    pub secret: String,
    pub expiration: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub username: String,
    pub secret: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct BlogCreate {
    pub title: String,
    pub subtitle: String,
    pub tag: String,
    pub body: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct BlogUpdate {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub tag: String,
    pub body: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct BlogDelete {
    pub id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct Blog {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub tag: String,
    pub body: String,
    pub created: String,
    pub updated: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct BlogHeader {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub tag: String,
    pub created: String,
    pub updated: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct BlogUpdated {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub tag: String,
    pub body: String,
    pub updated: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct StaticPageCreate {
    /// Single path segment the page is served under.
    pub name: String,
    pub body: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct StaticPage {
    pub body: String,
    pub created: String,
    pub updated: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct StaticPageCreated {
    pub name: String,
    pub body: String,
    pub created: String,
    pub updated: String,
}
