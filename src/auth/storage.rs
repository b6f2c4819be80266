//! Credential lookup.

use super::credential::StoredCredential;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;

/// Source of stored credentials, keyed by identity (username).
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// `Ok(None)` when the identity has no credential.
    async fn lookup(&self, identity: &str) -> Result<Option<StoredCredential>>;
}

/// Credentials read from the `users` and `credentials` tables.
#[derive(Clone, Debug)]
pub struct PgCredentials {
    pool: PgPool,
}

impl PgCredentials {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialSource for PgCredentials {
    async fn lookup(&self, identity: &str) -> Result<Option<StoredCredential>> {
        let query = r"
            SELECT b.hash, b.salt
            FROM users AS a
            INNER JOIN credentials AS b ON a.id = b.user_id
            WHERE a.username = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credential")?;

        Ok(row.map(|row| StoredCredential {
            hash: row.get("hash"),
            salt: row.get("salt"),
        }))
    }
}
