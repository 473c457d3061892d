//! Account store — the only durability boundary of the core
//!
//! Implementations must provide:
//! - an atomic unique insert keyed on both `id` and `email`
//! - a conditional update that applies only if the stored version still
//!   equals the version the caller read
//!
//! Those two primitives are all the service needs to keep balances and
//! sessions linearizable across any number of concurrent callers.

use async_trait::async_trait;

use crate::account::Account;
use crate::error::Result;

#[cfg(feature = "memory-store")]
pub mod memory;

#[cfg(feature = "sled-store")]
pub mod sled_store;

#[cfg(feature = "memory-store")]
pub use memory::MemoryStore;

#[cfg(feature = "sled-store")]
pub use sled_store::SledStore;

/// Result of a conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was replaced
    Applied,
    /// Someone else wrote first; re-read and retry
    VersionConflict,
    /// No record with that id
    NotFound,
}

/// Durable, concurrency-safe persistence for account records
///
/// `Err` is reserved for infrastructure failures. Business outcomes
/// (duplicate email, version conflict, missing record) are values.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `AccountAlreadyExists` if the email
    /// or the id is already taken; check and insert are one atomic step.
    async fn insert(&self, account: &Account) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Replace the record `id` with `next` iff its stored version is
    /// `expected_version`
    async fn conditional_update(
        &self,
        id: &str,
        expected_version: u64,
        next: &Account,
    ) -> Result<UpdateOutcome>;
}
