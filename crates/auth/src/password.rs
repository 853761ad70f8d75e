//! Password hashing.
//!
//! Stored hashes are self-describing so verification does not depend on the
//! scheme currently configured for new hashes: PBKDF2 hashes are PHC strings
//! (`$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`), plaintext ones are
//! `plaintext$<password>`.

use core::str::FromStr;

use pbkdf2::Pbkdf2;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use rand::Rng;
use thiserror::Error;

const SALT_LEN: usize = 16;
const DEFAULT_ROUNDS: u32 = 100_000;
const PLAINTEXT_PREFIX: &str = "plaintext$";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("unknown password scheme '{0}'")]
    UnknownScheme(String),

    #[error("malformed password hash")]
    MalformedHash,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PasswordScheme {
    /// Stores the password as-is. Test fixtures only.
    Plaintext,
    /// PBKDF2-HMAC-SHA256 with a random salt.
    #[default]
    Pbkdf2,
}

impl FromStr for PasswordScheme {
    type Err = PasswordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plaintext" => Ok(Self::Plaintext),
            "pbkdf2" | "pbkdf2-sha256" => Ok(Self::Pbkdf2),
            other => Err(PasswordError::UnknownScheme(other.to_string())),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct PasswordHasher {
    scheme: PasswordScheme,
    rounds: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(PasswordScheme::default())
    }
}

impl PasswordHasher {
    pub fn new(scheme: PasswordScheme) -> Self {
        Self {
            scheme,
            rounds: DEFAULT_ROUNDS,
        }
    }

    #[cfg(test)]
    fn with_rounds(scheme: PasswordScheme, rounds: u32) -> Self {
        Self { scheme, rounds }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        match self.scheme {
            PasswordScheme::Plaintext => Ok(format!("{PLAINTEXT_PREFIX}{password}")),
            PasswordScheme::Pbkdf2 => {
                let mut raw_salt = [0u8; SALT_LEN];
                rand::thread_rng().fill(&mut raw_salt);
                let salt = SaltString::encode_b64(&raw_salt).map_err(|e| PasswordError::Hashing(e.to_string()))?;

                let params = pbkdf2::Params {
                    rounds: self.rounds,
                    output_length: 32,
                };
                let hash = Pbkdf2
                    .hash_password_customized(
                        password.as_bytes(),
                        Some(pbkdf2::Algorithm::Pbkdf2Sha256.ident()),
                        None,
                        params,
                        &salt,
                    )
                    .map_err(|e| PasswordError::Hashing(e.to_string()))?;
                Ok(hash.to_string())
            }
        }
    }

    /// Check `password` against a stored hash of either scheme.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        if let Some(expected) = stored.strip_prefix(PLAINTEXT_PREFIX) {
            return Ok(expected == password);
        }

        let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;
        if parsed.algorithm != pbkdf2::Algorithm::Pbkdf2Sha256.ident() {
            return Err(PasswordError::UnknownScheme(parsed.algorithm.to_string()));
        }

        match Pbkdf2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(pbkdf2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(PasswordError::MalformedHash),
        }
    }
}
