use super::{Step, StepOutcome, StoreError};
use crate::context::RequestContext;
use sqlx::{Database, Pool};
use tracing::{Instrument, info_span, warn};

/// Runs one statement-atomic [`Step`] on a pooled connection, without an
/// enclosing transaction.
#[derive(Debug)]
pub struct ConnectionExecutor<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> Clone for ConnectionExecutor<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB: Database> ConnectionExecutor<DB> {
    #[must_use]
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    /// Apply `step` with a default prior outcome. The connection goes back to
    /// the pool on every path, including deadline expiry.
    ///
    /// # Errors
    /// [`StoreError::Acquire`] when no connection is available,
    /// [`StoreError::Step`] with index 0 when the step fails and
    /// [`StoreError::Timeout`] when the deadline in `ctx` passes.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        step: &dyn Step<DB>,
    ) -> Result<StepOutcome, StoreError> {
        let work = async {
            let mut conn = self.pool.acquire().await.map_err(StoreError::Acquire)?;
            step.apply(StepOutcome::default(), &mut *conn)
                .await
                .map_err(|source| StoreError::Step { index: 0, source })
        };
        ctx.bounded(work)
            .instrument(info_span!("db.connection"))
            .await
            .map_err(|_| {
                warn!("statement exceeded the request deadline");
                StoreError::Timeout
            })?
    }
}
