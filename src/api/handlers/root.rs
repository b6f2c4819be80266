use crate::api::GIT_COMMIT_HASH;
use axum::response::Json;
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct About {
    name: &'static str,
    version: &'static str,
    commit: &'static str,
}

/// Service banner for `GET /`.
pub async fn root() -> Json<About> {
    Json(About {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        commit: GIT_COMMIT_HASH,
    })
}
