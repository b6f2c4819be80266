//! Write path to the data store.
//!
//! A [`Step`] is one unit of write work. It receives the [`StepOutcome`] of
//! the step before it (the first step gets `StepOutcome::default()`) and the
//! connection to run on. Dependent steps are composed into a [`Sequence`] and
//! run atomically by the [`TransactionSequencer`]; a single statement that is
//! already atomic runs through the [`ConnectionExecutor`].
//!
//! Both runners are generic over [`sqlx::Database`]. The service uses
//! PostgreSQL.

mod executor;
mod sequencer;

pub use executor::ConnectionExecutor;
pub use sequencer::TransactionSequencer;

use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

/// Typed result handed from one step to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Identifier generated by the step, if any.
    pub id: Option<i64>,
    pub rows_affected: u64,
}

impl StepOutcome {
    #[must_use]
    pub fn inserted(id: i64) -> Self {
        Self {
            id: Some(id),
            rows_affected: 1,
        }
    }

    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            id: None,
            rows_affected,
        }
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Database(sqlx::Error),
    /// The row the step targets does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The prior step did not produce what this step needs.
    #[error("missing input from previous step: {0}")]
    MissingInput(&'static str),
}

impl From<sqlx::Error> for StepError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict(err.to_string())
        } else {
            Self::Database(err)
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to acquire connection")]
    Acquire(#[source] sqlx::Error),
    #[error("failed to begin transaction")]
    Begin(#[source] sqlx::Error),
    #[error("failed to commit transaction")]
    Commit(#[source] sqlx::Error),
    #[error("step {index} failed")]
    Step {
        index: usize,
        #[source]
        source: StepError,
    },
    #[error("step {index} failed ({step}) and rollback failed")]
    Rollback {
        index: usize,
        step: StepError,
        #[source]
        rollback: sqlx::Error,
    },
    #[error("request deadline exceeded")]
    Timeout,
}

impl StoreError {
    /// The failing step's error, when a step failed.
    #[must_use]
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::Step { source, .. } => Some(source),
            Self::Rollback { step, .. } => Some(step),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Step<DB: Database>: Send + Sync {
    async fn apply(
        &self,
        prior: StepOutcome,
        conn: &mut DB::Connection,
    ) -> Result<StepOutcome, StepError>;
}

/// Ordered steps run as one atomic unit.
pub struct Sequence<DB: Database> {
    steps: Vec<Box<dyn Step<DB>>>,
}

impl<DB: Database> Sequence<DB> {
    #[must_use]
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    #[must_use]
    pub fn then(mut self, step: impl Step<DB> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn steps(&self) -> &[Box<dyn Step<DB>>] {
        &self.steps
    }
}

impl<DB: Database> Default for Sequence<DB> {
    fn default() -> Self {
        Self::new()
    }
}
