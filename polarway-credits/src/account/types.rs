//! Account domain types — Role, Account, AccountSummary, Principal
//!
//! `Account` is the only persisted entity. Everything handed back to callers
//! is a view that never carries the credential hash or the session digest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AccountError, Result};

/// Account identifier (UUID v4, string form)
pub type AccountId = String;

/// Account roles with hierarchical permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }

    /// Permission level (higher = more access)
    pub fn level(&self) -> u8 {
        match self {
            Self::User => 0,
            Self::Admin => 1,
        }
    }

    /// Check if this role has at least the permissions of `required`
    pub fn has_permission(&self, required: Role) -> bool {
        self.level() >= required.level()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(AccountError::Internal(format!("unknown role: {other}"))),
        }
    }
}

/// The single authorization predicate for privileged operations
pub fn require_role(actual: Role, required: Role) -> Result<()> {
    if actual.has_permission(required) {
        Ok(())
    } else {
        Err(AccountError::Unauthorized)
    }
}

/// Account record, as held by the account store
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub credential_hash: String,
    pub credits: u64,
    pub role: Role,
    /// SHA-256 digest of the last issued session token
    pub active_session: Option<String>,
    /// Bumped by every successful mutation; the store's compare-and-swap key
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh account at version 1 with no active session
    pub fn new(email: String, credential_hash: String, role: Role, credits: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            credential_hash,
            credits,
            role,
            active_session: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_credits(&self) -> bool {
        self.credits > 0
    }

    pub fn has_active_session(&self) -> bool {
        self.active_session.is_some()
    }

    /// Refresh `updated_at` without ever moving it backwards
    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Caller-facing view of this account
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            account_id: self.id.clone(),
            email: self.email.clone(),
            credits: self.credits,
            role: self.role,
            created_at: self.created_at,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            account_id: self.id.clone(),
            role: self.role,
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("credential_hash", &"<redacted>")
            .field("credits", &self.credits)
            .field("role", &self.role)
            .field("active_session", &self.active_session.as_ref().map(|_| "<redacted>"))
            .field("version", &self.version)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Public account view returned by registration and balance lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub email: String,
    pub credits: u64,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Identity attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub account_id: AccountId,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Admin.has_permission(Role::User));
        assert!(Role::Admin.has_permission(Role::Admin));
        assert!(!Role::User.has_permission(Role::Admin));
        assert!(require_role(Role::User, Role::Admin).is_err());
        assert!(require_role(Role::Admin, Role::Admin).is_ok());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"ADMIN\"");
        let parsed: Role = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(parsed, Role::User);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_account_defaults() {
        let acct = Account::new("a@x.com".into(), "$argon2id$fake".into(), Role::User, 10);
        assert_eq!(acct.version, 1);
        assert_eq!(acct.credits, 10);
        assert!(!acct.has_active_session());
        assert_eq!(acct.created_at, acct.updated_at);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut acct = Account::new("a@x.com".into(), "$argon2id$secret".into(), Role::User, 1);
        acct.active_session = Some("deadbeef".into());
        let dbg = format!("{acct:?}");
        assert!(!dbg.contains("secret"));
        assert!(!dbg.contains("deadbeef"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_summary_omits_hash() {
        let acct = Account::new("a@x.com".into(), "$argon2id$secret".into(), Role::Admin, 0);
        let json = serde_json::to_string(&acct.summary()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"ADMIN\""));
    }
}
