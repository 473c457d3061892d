//! In-memory account store
//!
//! One `RwLock` guards the record map and the email index together, so the
//! uniqueness check and the insert cannot interleave with another insert.
//! The lock is never held across an `.await`.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::account::Account;
use crate::error::{AccountError, Result};

use super::{AccountStore, UpdateOutcome};

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    emails: HashMap<String, String>,
}

/// Process-local store, shareable via `Arc<MemoryStore>`
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert(&self, account: &Account) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.emails.contains_key(&account.email) {
            return Err(AccountError::AccountAlreadyExists(account.email.clone()));
        }
        if inner.accounts.contains_key(&account.id) {
            return Err(AccountError::AccountAlreadyExists(account.id.clone()));
        }
        inner.emails.insert(account.email.clone(), account.id.clone());
        inner.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.inner.read().accounts.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.inner.read();
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_version: u64,
        next: &Account,
    ) -> Result<UpdateOutcome> {
        let mut inner = self.inner.write();
        let Some(current) = inner.accounts.get_mut(id) else {
            return Ok(UpdateOutcome::NotFound);
        };
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
        *current = next.clone();
        Ok(UpdateOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;

    fn account(email: &str) -> Account {
        Account::new(email.into(), "$argon2id$fake".into(), Role::User, 10)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::new();
        let acct = account("a@x.com");
        store.insert(&acct).await.unwrap();

        let by_id = store.find_by_id(&acct.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@x.com");
        let by_email = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, acct.id);
        assert!(store.find_by_email("A@x.com").await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.insert(&account("a@x.com")).await.unwrap();
        let err = store.insert(&account("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AccountError::AccountAlreadyExists(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_update_checks_version() {
        let store = MemoryStore::new();
        let acct = account("a@x.com");
        store.insert(&acct).await.unwrap();

        let mut next = acct.clone();
        next.consume_credit().unwrap();
        assert_eq!(
            store.conditional_update(&acct.id, 1, &next).await.unwrap(),
            UpdateOutcome::Applied
        );
        // Stale writer still holding version 1
        assert_eq!(
            store.conditional_update(&acct.id, 1, &next).await.unwrap(),
            UpdateOutcome::VersionConflict
        );
        assert_eq!(
            store.conditional_update("missing", 1, &next).await.unwrap(),
            UpdateOutcome::NotFound
        );

        let stored = store.find_by_id(&acct.id).await.unwrap().unwrap();
        assert_eq!(stored.credits, 9);
        assert_eq!(stored.version, 2);
    }
}
