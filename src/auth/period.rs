//! Session period parsing.
//!
//! Periods use humantime notation: `"1h"`, `"90m"`, `"1h 30m"`, `"250ms"`.
//! A bare `"0"` parses to zero; callers decide whether a zero period is
//! meaningful.

use humantime::DurationError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period is empty")]
    Empty,
    #[error("invalid period {input:?}: {reason}")]
    Invalid { input: String, reason: String },
    #[error("unknown unit {unit:?} in period {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("period {0:?} is too large")]
    Overflow(String),
}

/// Parse a period string into a [`Duration`].
///
/// # Errors
/// Returns [`PeriodError`] when the input is empty, malformed, uses an unknown
/// unit, or does not fit in a `Duration`.
pub fn parse_period(input: &str) -> Result<Duration, PeriodError> {
    let trimmed = input.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(trimmed).map_err(|err| match err {
        DurationError::Empty => PeriodError::Empty,
        DurationError::NumberOverflow => PeriodError::Overflow(input.to_string()),
        DurationError::UnknownUnit { unit, .. } if !unit.is_empty() => PeriodError::UnknownUnit {
            unit,
            input: input.to_string(),
        },
        other => PeriodError::Invalid {
            input: input.to_string(),
            reason: other.to_string(),
        },
    })
}
