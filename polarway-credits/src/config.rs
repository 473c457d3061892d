//! Configuration for Polarway Credits

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AccountError, Result};

/// Credits configuration
#[derive(Debug, Clone)]
pub struct CreditsConfig {
    /// Root path for the on-disk account store
    pub base_path: PathBuf,

    /// JWT secret for session token signing
    pub jwt_secret: String,

    /// Session token expiry in days
    pub session_expiry_days: u32,

    /// Balance granted to new `USER` accounts
    pub initial_user_credits: u64,

    /// Upper bound on read-compute-write cycles per mutation
    pub max_update_attempts: u32,

    /// Base delay between conflicting attempts (doubles each retry)
    pub retry_backoff_ms: u64,

    /// Flush the sled log after every write
    pub flush_on_write: bool,

    /// Bootstrap admin email (POLARWAY_ADMIN_EMAIL)
    pub admin_email: Option<String>,

    /// Bootstrap admin password (POLARWAY_ADMIN_PASSWORD)
    pub admin_password: Option<String>,
}

impl CreditsConfig {
    /// Create config with sensible defaults
    ///
    /// # Arguments
    /// * `base_path` - Root directory for persistent state.
    ///   Structure created by the sled store:
    ///   ```text
    ///   base_path/
    ///   └── accounts.sled/   (trees: accounts, emails)
    ///   ```
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            jwt_secret: std::env::var("POLARWAY_JWT_SECRET")
                .unwrap_or_else(|_| "polarway-credits-default-secret-change-me".to_string()),
            session_expiry_days: 7,
            initial_user_credits: 10,
            max_update_attempts: 5,
            retry_backoff_ms: 2,
            flush_on_write: false,
            admin_email: std::env::var("POLARWAY_ADMIN_EMAIL").ok(),
            admin_password: std::env::var("POLARWAY_ADMIN_PASSWORD").ok(),
        }
    }

    /// Override JWT secret
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    /// Override session expiry
    pub fn with_session_expiry_days(mut self, days: u32) -> Self {
        self.session_expiry_days = days;
        self
    }

    /// Override the starting balance of `USER` accounts
    pub fn with_initial_user_credits(mut self, credits: u64) -> Self {
        self.initial_user_credits = credits;
        self
    }

    /// Override the optimistic update bound
    pub fn with_max_update_attempts(mut self, attempts: u32) -> Self {
        self.max_update_attempts = attempts;
        self
    }

    /// Override the retry backoff base
    pub fn with_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }

    pub fn with_flush_on_write(mut self, flush: bool) -> Self {
        self.flush_on_write = flush;
        self
    }

    /// Set the bootstrap admin credentials
    pub fn with_admin(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin_email = Some(email.into());
        self.admin_password = Some(password.into());
        self
    }

    /// Path of the sled database directory
    pub fn db_path(&self) -> PathBuf {
        self.base_path.join("accounts.sled")
    }

    /// Backoff before retry number `attempt` (1-based), capped at 64x the base
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(6);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(AccountError::Config("jwt_secret must not be empty".into()));
        }
        if self.max_update_attempts == 0 {
            return Err(AccountError::Config("max_update_attempts must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = CreditsConfig::new("/tmp/test_credits");
        assert_eq!(cfg.session_expiry_days, 7);
        assert_eq!(cfg.initial_user_credits, 10);
        assert_eq!(cfg.max_update_attempts, 5);
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/test_credits/accounts.sled"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let cfg = CreditsConfig::new("/data")
            .with_jwt_secret("my-secret")
            .with_session_expiry_days(30)
            .with_initial_user_credits(25)
            .with_max_update_attempts(3)
            .with_admin("root@example.com", "r00t-pass");

        assert_eq!(cfg.jwt_secret, "my-secret");
        assert_eq!(cfg.session_expiry_days, 30);
        assert_eq!(cfg.initial_user_credits, 25);
        assert_eq!(cfg.max_update_attempts, 3);
        assert_eq!(cfg.admin_email.as_deref(), Some("root@example.com"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = CreditsConfig::new("/data").with_retry_backoff_ms(2);
        assert_eq!(cfg.retry_backoff(1), Duration::from_millis(2));
        assert_eq!(cfg.retry_backoff(2), Duration::from_millis(4));
        assert_eq!(cfg.retry_backoff(3), Duration::from_millis(8));
        assert_eq!(cfg.retry_backoff(50), Duration::from_millis(128));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let cfg = CreditsConfig::new("/data").with_max_update_attempts(0);
        assert!(matches!(cfg.validate(), Err(AccountError::Config(_))));

        let cfg = CreditsConfig::new("/data").with_jwt_secret("");
        assert!(cfg.validate().is_err());
    }
}
