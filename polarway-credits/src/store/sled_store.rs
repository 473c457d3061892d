//! SledStore — embedded on-disk account store
//!
//! Two trees under one database:
//! ```text
//! accounts.sled/
//! ├── accounts   id    → JSON-encoded Account
//! └── emails     email → id
//! ```
//!
//! Inserts run as a two-tree transaction so the email index and the record
//! land together or not at all. Updates are a single `compare_and_swap` on
//! the record bytes, guarded by the version the caller read.

use std::path::Path;

use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info};

use crate::account::Account;
use crate::config::CreditsConfig;
use crate::error::{AccountError, Result};

use super::{AccountStore, UpdateOutcome};

const TREE_ACCOUNTS: &str = "accounts";
const TREE_EMAILS: &str = "emails";

/// Account store backed by sled, shareable via `Arc<SledStore>`
pub struct SledStore {
    db: Db,
    accounts: Tree,
    emails: Tree,
    flush_on_write: bool,
}

impl SledStore {
    /// Open (or create) the store at `config.db_path()`
    pub fn open(config: &CreditsConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_path)?;
        let store = Self::open_path(config.db_path())?;
        Ok(Self {
            flush_on_write: config.flush_on_write,
            ..store
        })
    }

    /// Open a store at an explicit path
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        let accounts = db.open_tree(TREE_ACCOUNTS)?;
        let emails = db.open_tree(TREE_EMAILS)?;
        info!(
            path = %path.as_ref().display(),
            accounts = accounts.len(),
            "Account store opened"
        );
        Ok(Self {
            db,
            accounts,
            emails,
            flush_on_write: false,
        })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Force buffered writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    async fn after_write(&self) -> Result<()> {
        if self.flush_on_write {
            self.flush().await?;
        }
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Account> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[async_trait]
impl AccountStore for SledStore {
    async fn insert(&self, account: &Account) -> Result<()> {
        let bytes = serde_json::to_vec(account)?;
        let id = account.id.as_bytes();
        let email = account.email.as_bytes();

        let result = (&self.accounts, &self.emails).transaction(|(accounts, emails)| {
            if emails.get(email)?.is_some() || accounts.get(id)?.is_some() {
                return Err(ConflictableTransactionError::Abort(()));
            }
            emails.insert(email, id)?;
            accounts.insert(id, bytes.as_slice())?;
            Ok(())
        });

        match result {
            Ok(()) => {
                self.after_write().await?;
                Ok(())
            }
            Err(TransactionError::Abort(())) => {
                Err(AccountError::AccountAlreadyExists(account.email.clone()))
            }
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        match self.accounts.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let Some(id) = self.emails.get(email.as_bytes())? else {
            return Ok(None);
        };
        match self.accounts.get(&id)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_version: u64,
        next: &Account,
    ) -> Result<UpdateOutcome> {
        let Some(current_bytes) = self.accounts.get(id.as_bytes())? else {
            return Ok(UpdateOutcome::NotFound);
        };
        let current = Self::decode(&current_bytes)?;
        if current.version != expected_version {
            debug!(
                account_id = id,
                expected = expected_version,
                actual = current.version,
                "Version conflict"
            );
            return Ok(UpdateOutcome::VersionConflict);
        }
        if next.id != current.id || next.email != current.email {
            return Err(AccountError::Internal(format!(
                "conditional update may not change identity of {id}"
            )));
        }

        let next_bytes = serde_json::to_vec(next)?;
        let swapped = self.accounts.compare_and_swap(
            id.as_bytes(),
            Some(current_bytes),
            Some(next_bytes),
        )?;

        match swapped {
            Ok(()) => {
                self.after_write().await?;
                Ok(UpdateOutcome::Applied)
            }
            Err(_) => {
                debug!(account_id = id, "Record changed between read and swap");
                Ok(UpdateOutcome::VersionConflict)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;
    use tempfile::TempDir;

    fn account(email: &str) -> Account {
        Account::new(email.into(), "$argon2id$fake".into(), Role::User, 10)
    }

    #[tokio::test]
    async fn test_insert_find_and_reopen() {
        let dir = TempDir::new().unwrap();
        let config = CreditsConfig::new(dir.path()).with_flush_on_write(true);
        let acct = account("disk@x.com");

        {
            let store = SledStore::open(&config).unwrap();
            store.insert(&acct).await.unwrap();
            assert_eq!(store.len(), 1);
        }

        let store = SledStore::open(&config).unwrap();
        let found = store.find_by_email("disk@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, acct.id);
        assert_eq!(found.credits, 10);
    }

    #[tokio::test]
    async fn test_duplicate_email_aborts_transaction() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(&CreditsConfig::new(dir.path())).unwrap();
        store.insert(&account("dup@x.com")).await.unwrap();

        let err = store.insert(&account("dup@x.com")).await.unwrap_err();
        assert!(matches!(err, AccountError::AccountAlreadyExists(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_stale_version() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(&CreditsConfig::new(dir.path())).unwrap();
        let acct = account("cas@x.com");
        store.insert(&acct).await.unwrap();

        let mut next = acct.clone();
        next.consume_credit().unwrap();
        assert_eq!(
            store.conditional_update(&acct.id, 1, &next).await.unwrap(),
            UpdateOutcome::Applied
        );
        assert_eq!(
            store.conditional_update(&acct.id, 1, &next).await.unwrap(),
            UpdateOutcome::VersionConflict
        );
        assert_eq!(
            store.conditional_update("nope", 1, &next).await.unwrap(),
            UpdateOutcome::NotFound
        );
        assert_eq!(store.find_by_id(&acct.id).await.unwrap().unwrap().credits, 9);
    }
}
