//! Session authority — only the newest login wins
//!
//! Each account holds at most one session digest. A login overwrites it
//! unconditionally, so any token issued earlier stops validating the moment
//! the new digest is written. There is no logout and no grace period.
//!
//! Tokens are HS256 JWTs carrying a random `jti`; the account stores only the
//! SHA-256 digest of the token, compared in constant time.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

use crate::config::CreditsConfig;
use crate::error::{AccountError, Result};

use super::types::{Account, AccountId, Role};

/// JWT claims for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (account id)
    pub sub: AccountId,
    /// Role string
    pub role: String,
    /// Unique token id
    pub jti: String,
    /// Expiry (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// A freshly minted token and the digest to persist for it
pub struct IssuedSession {
    pub token: String,
    pub digest: String,
}

/// Issues and validates single-active-session tokens
#[derive(Clone)]
pub struct SessionAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_days: i64,
}

impl SessionAuthority {
    pub fn new(secret: &str, expiry_days: u32) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_days: i64::from(expiry_days),
        }
    }

    pub fn from_config(config: &CreditsConfig) -> Self {
        Self::new(&config.jwt_secret, config.session_expiry_days)
    }

    /// Mint a new token for `account_id`
    pub fn issue(&self, account_id: &str, role: Role) -> Result<IssuedSession> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: account_id.to_string(),
            role: role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::days(self.expiry_days)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AccountError::Internal(format!("token signing failed: {e}")))?;
        let digest = token_digest(&token);
        Ok(IssuedSession { token, digest })
    }

    /// Verify signature and expiry, returning the claims
    pub fn decode(&self, token: &str) -> Result<SessionClaims> {
        let claims = decode::<SessionClaims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )?
        .claims;
        Ok(claims)
    }
}

/// Hex SHA-256 of a session token
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl Account {
    /// Replace whatever session was active with `digest`
    pub fn start_session(&mut self, digest: String) {
        self.active_session = Some(digest);
        self.bump();
    }

    /// `Ok` only if `presented` is the token of the latest login
    pub fn validate_session(&self, presented: &str) -> Result<()> {
        let Some(active) = self.active_session.as_deref() else {
            debug!(account_id = %self.id, "No active session");
            return Err(AccountError::SessionInvalidated);
        };

        let presented = token_digest(presented);
        if bool::from(presented.as_bytes().ct_eq(active.as_bytes())) {
            Ok(())
        } else {
            debug!(account_id = %self.id, "Session superseded");
            Err(AccountError::SessionInvalidated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> SessionAuthority {
        SessionAuthority::new("unit-test-secret-key-min-32-chars!!", 7)
    }

    fn account() -> Account {
        Account::new("s@x.com".into(), "$argon2id$fake".into(), Role::User, 10)
    }

    #[test]
    fn test_no_session_is_invalidated() {
        let acct = account();
        assert!(matches!(
            acct.validate_session("anything"),
            Err(AccountError::SessionInvalidated)
        ));
    }

    #[test]
    fn test_newest_login_wins() {
        let auth = authority();
        let mut acct = account();

        let first = auth.issue(&acct.id, acct.role).unwrap();
        acct.start_session(first.digest);
        assert!(acct.validate_session(&first.token).is_ok());

        let second = auth.issue(&acct.id, acct.role).unwrap();
        acct.start_session(second.digest);
        assert!(matches!(
            acct.validate_session(&first.token),
            Err(AccountError::SessionInvalidated)
        ));
        assert!(acct.validate_session(&second.token).is_ok());
        assert_eq!(acct.version, 3);
    }

    #[test]
    fn test_tokens_are_unique() {
        let auth = authority();
        let a = auth.issue("id-1", Role::User).unwrap();
        let b = auth.issue("id-1", Role::User).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_decode_round_trips_subject() {
        let auth = authority();
        let issued = auth.issue("id-42", Role::Admin).unwrap();
        let claims = auth.decode(&issued.token).unwrap();
        assert_eq!(claims.sub, "id-42");
        assert_eq!(claims.role, "ADMIN");
    }

    #[test]
    fn test_decode_rejects_foreign_signature() {
        let issued = SessionAuthority::new("some-other-secret-entirely-xxxxxx", 7)
            .issue("id-1", Role::User)
            .unwrap();
        assert!(matches!(
            authority().decode(&issued.token),
            Err(AccountError::Unauthorized)
        ));
        assert!(authority().decode("not.a.jwt").is_err());
    }

    #[test]
    fn test_decode_rejects_expired() {
        let secret = "unit-test-secret-key-min-32-chars!!";
        let past = (Utc::now() - Duration::days(2)).timestamp() as usize;
        let claims = SessionClaims {
            sub: "id-1".into(),
            role: "USER".into(),
            jti: "j".into(),
            exp: past,
            iat: past,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert!(authority().decode(&token).is_err());
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let d = token_digest("abc");
        assert_eq!(d.len(), 64);
        assert_eq!(
            d,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
