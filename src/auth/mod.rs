//! Session and penalty subsystem.
//!
//! [`PenaltyTracker`] gates login attempts per origin, [`SessionStore`] issues
//! and checks session secrets, and [`CredentialVerifier`] performs the one-way
//! passphrase comparison. [`AuthState`] owns one of each for the lifetime of
//! the service and is shared with handlers as an `Extension`.

pub mod credential;
pub mod penalty;
pub mod period;
pub mod session;
mod shard;
pub mod state;
pub mod storage;

pub use credential::{CredentialVerifier, StoredCredential};
pub use penalty::PenaltyTracker;
pub use period::{PeriodError, parse_period};
pub use session::{AuthError, MAX_SESSION_SECONDS, Session, SessionScope, SessionStore};
pub use state::{AuthConfig, AuthState};
pub use storage::{CredentialSource, PgCredentials};
