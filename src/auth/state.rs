//! Auth configuration and the shared state handed to handlers.

use super::{
    credential::{CredentialVerifier, StoredCredential},
    penalty::PenaltyTracker,
    session::{SessionScope, SessionStore},
    storage::CredentialSource,
};
use anyhow::{Context, Result};
use std::{fmt, sync::Arc, time::Duration};

const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_SESSION_MAX_SECONDS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    request_timeout: Duration,
    session_max_period: Duration,
    session_scope: SessionScope,
    trust_proxy_headers: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            session_max_period: Duration::from_secs(DEFAULT_SESSION_MAX_SECONDS),
            session_scope: SessionScope::default(),
            trust_proxy_headers: false,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_session_max_period(mut self, period: Duration) -> Self {
        self.session_max_period = period;
        self
    }

    #[must_use]
    pub fn with_session_scope(mut self, scope: SessionScope) -> Self {
        self.session_scope = scope;
        self
    }

    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn session_max_period(&self) -> Duration {
        self.session_max_period
    }

    #[must_use]
    pub fn session_scope(&self) -> SessionScope {
        self.session_scope
    }

    #[must_use]
    pub fn trust_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sessions, penalties and credential access for one service instance.
pub struct AuthState {
    config: AuthConfig,
    sessions: SessionStore,
    penalties: PenaltyTracker,
    verifier: CredentialVerifier,
    credentials: Arc<dyn CredentialSource>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        let sessions = SessionStore::new(config.session_scope(), config.session_max_period());
        Self {
            config,
            sessions,
            penalties: PenaltyTracker::new(),
            verifier: CredentialVerifier::new(),
            credentials,
        }
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: CredentialVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn penalties(&self) -> &PenaltyTracker {
        &self.penalties
    }

    /// Look up `identity` and compare `passphrase` against its stored hash.
    ///
    /// An unknown identity is a mismatch, not an error, and is compared
    /// against [`StoredCredential::decoy`]. The Argon2 work runs on the
    /// blocking pool.
    ///
    /// # Errors
    /// Returns an error if the lookup fails or the comparison task panics.
    pub async fn verify_credentials(&self, identity: &str, passphrase: &str) -> Result<bool> {
        let (stored, known) = match self.credentials.lookup(identity).await? {
            Some(stored) => (stored, true),
            None => (StoredCredential::decoy(), false),
        };
        let verifier = self.verifier.clone();
        let passphrase = passphrase.to_string();
        let matched = tokio::task::spawn_blocking(move || {
            verifier.compare(&passphrase, &stored.salt, &stored.hash)
        })
        .await
        .context("credential comparison task failed")?;
        Ok(known && matched)
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("penalties", &self.penalties)
            .finish_non_exhaustive()
    }
}
