use super::{Sequence, StepOutcome, StoreError};
use crate::context::RequestContext;
use sqlx::{Database, Pool};
use tracing::{Instrument, debug, info_span, warn};

/// Runs a [`Sequence`] inside one transaction: every step commits or none do.
#[derive(Debug)]
pub struct TransactionSequencer<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> Clone for TransactionSequencer<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB: Database> TransactionSequencer<DB> {
    #[must_use]
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    /// Run `sequence`, threading each step's outcome into the next, and
    /// return the outcome of the last step.
    ///
    /// The first failing step stops the run and the transaction is rolled
    /// back. If the deadline in `ctx` passes first, the in-flight work is
    /// dropped, which rolls the transaction back, and nothing is committed.
    ///
    /// # Errors
    /// [`StoreError::Step`] for a failing step, [`StoreError::Rollback`] when
    /// the rollback after it also fails, [`StoreError::Begin`] or
    /// [`StoreError::Commit`] for transaction control failures, and
    /// [`StoreError::Timeout`] when the deadline passes.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        sequence: &Sequence<DB>,
    ) -> Result<StepOutcome, StoreError> {
        let span = info_span!("db.transaction", db.steps = sequence.len());
        ctx.bounded(self.run_steps(sequence))
            .instrument(span)
            .await
            .map_err(|_| {
                warn!("transaction exceeded the request deadline");
                StoreError::Timeout
            })?
    }

    async fn run_steps(&self, sequence: &Sequence<DB>) -> Result<StepOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Begin)?;
        let mut outcome = StepOutcome::default();

        for (index, step) in sequence.steps().iter().enumerate() {
            match step.apply(outcome, &mut *tx).await {
                Ok(next) => outcome = next,
                Err(source) => {
                    debug!(index, "step failed, rolling back: {source}");
                    return Err(match tx.rollback().await {
                        Ok(()) => StoreError::Step { index, source },
                        Err(rollback) => {
                            warn!(index, "rollback failed after step error: {rollback}");
                            StoreError::Rollback {
                                index,
                                step: source,
                                rollback,
                            }
                        }
                    });
                }
            }
        }

        tx.commit().await.map_err(StoreError::Commit)?;
        Ok(outcome)
    }
}
