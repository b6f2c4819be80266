//! Steps that write `page_content` rows, shared by blog posts and static pages.

use crate::store::{Step, StepError, StepOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres};
use tracing::{Instrument, info_span};

/// Insert a content row; the outcome carries its generated id.
pub(crate) struct InsertContent {
    pub(crate) body: String,
    pub(crate) at: DateTime<Utc>,
}

#[async_trait]
impl Step<Postgres> for InsertContent {
    async fn apply(
        &self,
        _prior: StepOutcome,
        conn: &mut PgConnection,
    ) -> Result<StepOutcome, StepError> {
        let query = "INSERT INTO page_content (created, updated, body) VALUES ($1, $1, $2) RETURNING id";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let id: i64 = sqlx::query_scalar(query)
            .bind(self.at)
            .bind(&self.body)
            .fetch_one(&mut *conn)
            .instrument(span)
            .await?;
        Ok(StepOutcome::inserted(id))
    }
}

/// Content id from the prior step, or a step error if it produced none.
pub(crate) fn content_id(prior: StepOutcome) -> Result<i64, StepError> {
    prior.id.ok_or(StepError::MissingInput("content id"))
}
