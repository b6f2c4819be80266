//! In-memory session table.
//!
//! A session is issued after a successful credential check and proves
//! authentication for later writes until it expires. Only a SHA-256 digest of
//! each secret is kept; the raw secret is returned once, to the caller of
//! [`SessionStore::authenticate`].

use super::shard::ShardedMap;
use anyhow::{Context, anyhow};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::{fmt, future::Future, str::FromStr, time::Duration};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

const SECRET_BYTES: usize = 32;

/// Ceiling for the configurable session maximum; one hundred years.
pub const MAX_SESSION_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, expired or mismatched session. Deliberately carries no detail.
    #[error("unauthorized")]
    Unauthorized,
    #[error("session period must be greater than zero")]
    InvalidPeriod,
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

/// How sessions are keyed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionScope {
    /// One session per `(origin, identity)`: a secret is only valid from the
    /// address that logged in.
    #[default]
    Origin,
    /// One session per identity, usable from any address.
    Identity,
}

impl SessionScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Identity => "identity",
        }
    }
}

impl fmt::Display for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "origin" => Ok(Self::Origin),
            "identity" => Ok(Self::Identity),
            other => Err(format!(
                "invalid session scope {other:?}, expected \"origin\" or \"identity\""
            )),
        }
    }
}

/// Issued session. `secret` is the only copy of the raw value.
#[derive(Clone)]
pub struct Session {
    pub identity: String,
    pub secret: String,
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("secret", &"***")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum SessionKey {
    Origin { origin: String, identity: String },
    Identity(String),
}

struct SessionRecord {
    secret_hash: [u8; 32],
    expiration: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: ShardedMap<SessionKey, SessionRecord>,
    scope: SessionScope,
    max_period: Duration,
}

impl SessionStore {
    /// `max_period` is capped at [`MAX_SESSION_SECONDS`].
    #[must_use]
    pub fn new(scope: SessionScope, max_period: Duration) -> Self {
        Self {
            sessions: ShardedMap::new(),
            scope,
            max_period: max_period.min(Duration::from_secs(MAX_SESSION_SECONDS)),
        }
    }

    #[must_use]
    pub fn scope(&self) -> SessionScope {
        self.scope
    }

    #[must_use]
    pub fn max_period(&self) -> Duration {
        self.max_period
    }

    /// Run one login attempt.
    ///
    /// `verify` performs the credential lookup and comparison. It resolves to
    /// `Ok(true)` on a match, `Ok(false)` on a mismatch (including an unknown
    /// identity) and `Err` on an infrastructure failure. A session is created
    /// only on a match. Penalty bookkeeping is left to the caller, which has
    /// already checked that `origin` is not penalised.
    ///
    /// # Errors
    /// [`AuthError::InvalidPeriod`] for a zero period (checked before `verify`
    /// runs) and [`AuthError::Infrastructure`] when `verify` or secret
    /// generation fails.
    pub async fn authenticate<F>(
        &self,
        origin: &str,
        identity: &str,
        period: Duration,
        verify: F,
    ) -> Result<Option<Session>, AuthError>
    where
        F: Future<Output = anyhow::Result<bool>>,
    {
        if period.is_zero() {
            return Err(AuthError::InvalidPeriod);
        }
        if !verify.await? {
            return Ok(None);
        }
        self.issue(origin, identity, period, Utc::now()).map(Some)
    }

    pub(crate) fn issue(
        &self,
        origin: &str,
        identity: &str,
        period: Duration,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        let period = period.min(self.max_period);
        let ttl = TimeDelta::from_std(period).context("session period out of range")?;
        let expiration = now
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("session expiration out of range"))?;
        let secret = generate_secret()?;

        self.prune(now);
        let key = self.key(origin, identity);
        self.sessions.insert(
            key,
            SessionRecord {
                secret_hash: hash_secret(&secret),
                expiration,
            },
        );
        debug!(identity, %expiration, "session issued");

        Ok(Session {
            identity: identity.to_string(),
            secret,
            expiration,
        })
    }

    /// Guard for every write: succeeds iff a session exists for the key,
    /// its secret matches and it has not expired.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] in every failing case.
    pub fn authorized(&self, origin: &str, identity: &str, secret: &str) -> Result<(), AuthError> {
        self.authorized_at(origin, identity, secret, Utc::now())
    }

    pub(crate) fn authorized_at(
        &self,
        origin: &str,
        identity: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let key = self.key(origin, identity);
        let digest = hash_secret(secret);
        let valid = self.sessions.with_entry(&key, |entries| {
            entries.get(&key).is_some_and(|record| {
                bool::from(record.secret_hash[..].ct_eq(&digest[..])) && now <= record.expiration
            })
        });
        if valid {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
        }
    }

    /// Drop the session for `(origin, identity)`. Returns whether one existed.
    pub fn invalidate(&self, origin: &str, identity: &str) -> bool {
        let removed = self.sessions.remove(&self.key(origin, identity)).is_some();
        if removed {
            debug!(identity, "session invalidated");
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    fn prune(&self, now: DateTime<Utc>) {
        self.sessions.retain(|_, record| record.expiration >= now);
    }

    fn key(&self, origin: &str, identity: &str) -> SessionKey {
        match self.scope {
            SessionScope::Origin => SessionKey::Origin {
                origin: origin.to_string(),
                identity: identity.to_string(),
            },
            SessionScope::Identity => SessionKey::Identity(identity.to_string()),
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("scope", &self.scope)
            .field("max_period", &self.max_period)
            .field("sessions", &self.len())
            .finish()
    }
}

/// New random session secret, hex encoded (64 chars).
fn generate_secret() -> anyhow::Result<String> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session secret")?;
    Ok(hex::encode(bytes))
}

fn hash_secret(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}
