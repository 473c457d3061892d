//! AccountService — orchestration of store, verifier, ledger and sessions
//!
//! The service is stateless between calls: every operation loads the account
//! from the store, applies one transition to a request-scoped copy and writes
//! it back with a version-conditioned update. On a version conflict the whole
//! read-compute-write cycle restarts, up to `max_update_attempts` times.
//!
//! # Usage
//!
//! ```rust,no_run
//! use polarway_credits::{AccountService, CreditsConfig, Role};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CreditsConfig::new("/data/credits")
//!         .with_jwt_secret("my-production-secret");
//!
//!     let service = AccountService::open(config)?;
//!
//!     // Register → 10 starting credits
//!     let user = service.register("alice@example.com", "SecureP@ss1", Role::User).await?;
//!
//!     // Login → session token (invalidates any earlier one)
//!     let login = service.login("alice@example.com", "SecureP@ss1").await?;
//!
//!     // Authenticate each request, then spend
//!     service.authenticate_request(&user.account_id, &login.session_token).await?;
//!     let outcome = service.consume_credit(&user.account_id).await?;
//!     assert_eq!(outcome.remaining_credits, 9);
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::account::{grant_amount, require_role, Account, AccountId, AccountSummary, Principal, Role, SessionAuthority};
use crate::config::CreditsConfig;
use crate::credential::{Argon2Verifier, CredentialVerifier};
use crate::error::{AccountError, Result};
use crate::store::{AccountStore, UpdateOutcome};

/// Message returned by a successful consume
pub const CONSUME_MESSAGE: &str = "Credit consumed successfully";

// ─── Outcomes ───

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub account_id: AccountId,
    pub email: String,
    pub role: Role,
    pub session_token: String,
}

/// Successful consume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeOutcome {
    pub remaining_credits: u64,
    pub message: String,
}

/// Successful grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOutcome {
    pub account_id: AccountId,
    pub new_balance: u64,
    pub message: String,
}

// ─── Service ───

/// Account service; cheap to clone, share one per process
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    verifier: Arc<dyn CredentialVerifier>,
    sessions: SessionAuthority,
    config: CreditsConfig,
    /// Verified against when the login email is unknown, so both failure
    /// paths cost one hash check
    dummy_hash: Arc<str>,
}

impl AccountService {
    /// Build a service over explicit collaborators
    pub fn new(
        config: CreditsConfig,
        store: Arc<dyn AccountStore>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self> {
        config.validate()?;
        let dummy_hash = verifier.hash("polarway-credits-dummy-secret")?;
        let sessions = SessionAuthority::from_config(&config);
        info!(
            max_update_attempts = config.max_update_attempts,
            initial_user_credits = config.initial_user_credits,
            "AccountService ready"
        );
        Ok(Self {
            store,
            verifier,
            sessions,
            config,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Sled-backed service with the default Argon2 verifier
    #[cfg(feature = "sled-store")]
    pub fn open(config: CreditsConfig) -> Result<Self> {
        let store = Arc::new(crate::store::SledStore::open(&config)?);
        Self::new(config, store, Arc::new(Argon2Verifier::new()))
    }

    /// Process-local service with the default Argon2 verifier
    #[cfg(feature = "memory-store")]
    pub fn in_memory(config: CreditsConfig) -> Result<Self> {
        let store = Arc::new(crate::store::MemoryStore::new());
        Self::new(config, store, Arc::new(Argon2Verifier::new()))
    }

    pub fn config(&self) -> &CreditsConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionAuthority {
        &self.sessions
    }

    // ─── Registration ───

    /// Hash `secret` and register a new account
    pub async fn register(&self, email: &str, secret: &str, role: Role) -> Result<AccountSummary> {
        let credential_hash = self.verifier.hash(secret)?;
        self.register_with_hash(email, credential_hash, role).await
    }

    /// Register an account whose credential is already hashed
    ///
    /// Email uniqueness is enforced by the store's atomic insert; there is
    /// no separate lookup that a concurrent registration could slip past.
    pub async fn register_with_hash(
        &self,
        email: &str,
        credential_hash: String,
        role: Role,
    ) -> Result<AccountSummary> {
        let credits = match role {
            Role::User => self.config.initial_user_credits,
            Role::Admin => 0,
        };
        let account = Account::new(email.to_string(), credential_hash, role, credits);
        self.store.insert(&account).await?;
        info!(account_id = %account.id, role = %role, credits, "Account registered");
        Ok(account.summary())
    }

    /// Create the admin account if it does not exist yet
    pub async fn ensure_admin(&self, email: &str, secret: &str) -> Result<AccountSummary> {
        if let Some(existing) = self.store.find_by_email(email).await? {
            return Self::existing_admin(existing);
        }
        match self.register(email, secret, Role::Admin).await {
            Err(AccountError::AccountAlreadyExists(_)) => {
                let existing = self
                    .store
                    .find_by_email(email)
                    .await?
                    .ok_or_else(|| AccountError::AccountNotFound(email.to_string()))?;
                Self::existing_admin(existing)
            }
            other => other,
        }
    }

    /// Run [`ensure_admin`](Self::ensure_admin) with the configured credentials
    pub async fn bootstrap_admin_from_config(&self) -> Result<Option<AccountSummary>> {
        match (self.config.admin_email.clone(), self.config.admin_password.clone()) {
            (Some(email), Some(password)) => Ok(Some(self.ensure_admin(&email, &password).await?)),
            _ => {
                debug!("No bootstrap admin configured");
                Ok(None)
            }
        }
    }

    fn existing_admin(existing: Account) -> Result<AccountSummary> {
        if existing.is_admin() {
            info!(account_id = %existing.id, "Admin account already exists");
            Ok(existing.summary())
        } else {
            Err(AccountError::AccountAlreadyExists(existing.email))
        }
    }

    // ─── Sessions ───

    /// Verify credentials and start a new session, superseding any other
    ///
    /// Unknown email and wrong secret both fail with the same `Unauthorized`.
    pub async fn login(&self, email: &str, secret: &str) -> Result<LoginOutcome> {
        let Some(account) = self.store.find_by_email(email).await? else {
            let _ = self.verifier.verify(secret, &self.dummy_hash);
            debug!("Login rejected");
            return Err(AccountError::Unauthorized);
        };

        if !self.verifier.verify(secret, &account.credential_hash) {
            debug!(account_id = %account.id, "Login rejected");
            return Err(AccountError::Unauthorized);
        }

        let issued = self.sessions.issue(&account.id, account.role)?;
        let digest = issued.digest;
        let updated = self
            .update_with_retry(&account.id, |acct| {
                acct.start_session(digest.clone());
                Ok(())
            })
            .await
            .map_err(|e| match e {
                AccountError::AccountNotFound(_) => AccountError::Unauthorized,
                other => other,
            })?;

        info!(account_id = %updated.id, version = updated.version, "Login successful");
        Ok(LoginOutcome {
            account_id: updated.id,
            email: updated.email,
            role: updated.role,
            session_token: issued.token,
        })
    }

    /// Check that `token` belongs to the latest login of `account_id`
    pub async fn authenticate_request(&self, account_id: &str, token: &str) -> Result<Principal> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AccountError::Unauthorized)?;
        account.validate_session(token)?;
        Ok(account.principal())
    }

    /// Authenticate a bearer token alone: signature and expiry first, then
    /// the same latest-login check as [`authenticate_request`](Self::authenticate_request)
    pub async fn authenticate_bearer(&self, token: &str) -> Result<Principal> {
        let claims = self.sessions.decode(token)?;
        self.authenticate_request(&claims.sub, token).await
    }

    // ─── Credits ───

    pub async fn get_balance(&self, account_id: &str) -> Result<u64> {
        Ok(self.load(account_id).await?.credits)
    }

    pub async fn account_summary(&self, account_id: &str) -> Result<AccountSummary> {
        Ok(self.load(account_id).await?.summary())
    }

    /// Spend one credit
    pub async fn consume_credit(&self, account_id: &str) -> Result<ConsumeOutcome> {
        let updated = self
            .update_with_retry(account_id, |acct| acct.consume_credit().map(|_| ()))
            .await?;

        info!(account_id, remaining = updated.credits, "Credit consumed");
        Ok(ConsumeOutcome {
            remaining_credits: updated.credits,
            message: CONSUME_MESSAGE.to_string(),
        })
    }

    /// Grant `amount` credits to `target_id`; `admin_id` must be an admin
    pub async fn grant_credits(
        &self,
        admin_id: &str,
        target_id: &str,
        amount: i64,
    ) -> Result<GrantOutcome> {
        let grantor_role = self.authorize(admin_id, Role::Admin).await?;
        grant_amount(amount)?;

        let updated = self
            .update_with_retry(target_id, |acct| acct.add_credits(amount, grantor_role).map(|_| ()))
            .await?;

        info!(
            admin_id,
            account_id = target_id,
            amount,
            new_balance = updated.credits,
            "Credits granted"
        );
        Ok(GrantOutcome {
            account_id: updated.id,
            new_balance: updated.credits,
            message: format!("Successfully added {amount} credits"),
        })
    }

    // ─── Helpers ───

    async fn load(&self, account_id: &str) -> Result<Account> {
        self.store
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AccountError::AccountNotFound(account_id.to_string()))
    }

    /// Resolve the caller's role and require at least `required`.
    /// An unknown caller is unauthorized, not "not found".
    async fn authorize(&self, caller_id: &str, required: Role) -> Result<Role> {
        let role = match self.store.find_by_id(caller_id).await? {
            Some(caller) => caller.role,
            None => {
                warn!(caller_id, "Privileged call from unknown account");
                return Err(AccountError::Unauthorized);
            }
        };
        if let Err(e) = require_role(role, required) {
            warn!(caller_id, role = %role, required = %required, "Privileged call rejected");
            return Err(e);
        }
        Ok(role)
    }

    /// Optimistic read-compute-write against the store
    ///
    /// `apply` runs on a fresh copy every attempt. Its errors are terminal;
    /// only version conflicts loop.
    async fn update_with_retry<F>(&self, account_id: &str, mut apply: F) -> Result<Account>
    where
        F: FnMut(&mut Account) -> Result<()> + Send,
    {
        let max_attempts = self.config.max_update_attempts;

        for attempt in 1..=max_attempts {
            let current = self.load(account_id).await?;
            let mut next = current.clone();
            apply(&mut next)?;
            if next.version <= current.version {
                return Err(AccountError::Internal(format!(
                    "mutation of {account_id} did not advance its version"
                )));
            }

            match self
                .store
                .conditional_update(account_id, current.version, &next)
                .await?
            {
                UpdateOutcome::Applied => return Ok(next),
                UpdateOutcome::NotFound => {
                    return Err(AccountError::AccountNotFound(account_id.to_string()))
                }
                UpdateOutcome::VersionConflict => {
                    debug!(account_id, attempt, max_attempts, "Concurrent update, retrying");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_backoff(attempt)).await;
                    }
                }
            }
        }

        warn!(account_id, attempts = max_attempts, "Update retries exhausted");
        Err(AccountError::Conflict {
            account_id: account_id.to_string(),
            attempts: max_attempts,
        })
    }
}
