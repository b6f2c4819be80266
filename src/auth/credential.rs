//! Passphrase verification against stored salted hashes.

use anyhow::{Context, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::{RngCore, rngs::OsRng};
use subtle::ConstantTimeEq;
use tracing::warn;

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 32;

/// Salt and hash loaded for a single login attempt.
#[derive(Clone)]
pub struct StoredCredential {
    pub hash: Vec<u8>,
    pub salt: Vec<u8>,
}

impl StoredCredential {
    /// Compared in place of a missing credential so an unknown identity
    /// costs a full derivation.
    #[must_use]
    pub fn decoy() -> Self {
        Self {
            hash: vec![0; HASH_LEN],
            salt: vec![0; SALT_LEN],
        }
    }
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("hash", &"***")
            .field("salt", &"***")
            .finish()
    }
}

/// Argon2id one-way comparison. Stateless apart from its cost parameters.
#[derive(Clone, Debug, Default)]
pub struct CredentialVerifier {
    params: Params,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Derive `len` hash bytes for `passphrase` under `salt`.
    ///
    /// # Errors
    /// Returns an error if Argon2 rejects the salt or output length.
    pub fn derive(&self, passphrase: &str, salt: &[u8], len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.hasher()
            .hash_password_into(passphrase.as_bytes(), salt, &mut out)
            .map_err(|err| anyhow::anyhow!("{err}"))
            .context("failed to derive credential hash")?;
        Ok(out)
    }

    /// True iff `passphrase` hashes to `hash` under `salt`.
    ///
    /// The final comparison is constant-time over the whole hash.
    #[must_use]
    pub fn compare(&self, passphrase: &str, salt: &[u8], hash: &[u8]) -> bool {
        match self.derive(passphrase, salt, hash.len()) {
            Ok(derived) => derived.ct_eq(hash).into(),
            Err(err) => {
                warn!("Credential comparison failed: {err:#}");
                false
            }
        }
    }
}

/// Fresh random salt for provisioning a credential.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate credential salt")?;
    Ok(salt)
}

#[cfg(test)]
pub(crate) fn cheap_verifier() -> CredentialVerifier {
    // Minimum Argon2 cost; keeps tests fast without changing the algorithm.
    match Params::new(8, 1, 1, None) {
        Ok(params) => CredentialVerifier::with_params(params),
        Err(_) => CredentialVerifier::new(),
    }
}
