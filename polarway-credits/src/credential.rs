//! Credential verification — the opaque secret/hash capability
//!
//! The service only ever asks two questions: "hash this secret" and
//! "does this secret match this hash". [`Argon2Verifier`] answers both with
//! Argon2id PHC strings.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::{AccountError, Result};

/// Check plaintext secrets against stored hashes
pub trait CredentialVerifier: Send + Sync {
    /// Produce a self-describing hash for `secret`
    fn hash(&self, secret: &str) -> Result<String>;

    /// `true` only when `secret` matches `hash`; malformed hashes never match
    fn verify(&self, secret: &str, hash: &str) -> bool;
}

/// Argon2id verifier
#[derive(Clone)]
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Custom cost parameters (memory in KiB, iterations, lanes)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AccountError::Config(format!("argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| AccountError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, secret: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> Argon2Verifier {
        Argon2Verifier::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let v = verifier();
        let hash = v.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(v.verify("correct horse", &hash));
        assert!(!v.verify("wrong horse", &hash));
    }

    #[test]
    fn test_salted_hashes_differ() {
        let v = verifier();
        assert_ne!(v.hash("same").unwrap(), v.hash("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verifier().verify("anything", "not-a-phc-string"));
        assert!(!verifier().verify("", ""));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(
            Argon2Verifier::with_params(1, 0, 0),
            Err(AccountError::Config(_))
        ));
    }
}
