//! # Polarway Credits
//!
//! Account and credit ledger core for Polarway: per-user credit balances that
//! never go negative and never lose an update, and logins where only the
//! newest session is valid.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │              AccountService               │
//! │  register · login · authenticate ·        │
//! │  balance · consume · grant                │
//! ├───────────────┬───────────┬───────────────┤
//! │ CreditLedger  │  Session  │  Credential   │
//! │ (consume,     │ Authority │  Verifier     │
//! │  add)         │ (JWT, one │  (Argon2id)   │
//! │               │  digest)  │               │
//! ├───────────────┴───────────┴───────────────┤
//! │        AccountStore (trait)               │
//! │  atomic unique insert · versioned CAS     │
//! ├─────────────────────┬─────────────────────┤
//! │     MemoryStore     │      SledStore      │
//! └─────────────────────┴─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polarway_credits::{AccountService, CreditsConfig, Role};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AccountService::open(CreditsConfig::new("/data/credits"))?;
//!
//!     let admin = service.ensure_admin("admin@example.com", "admin-secret").await?;
//!     let user = service.register("a@x.com", "user-secret", Role::User).await?;
//!
//!     let granted = service.grant_credits(&admin.account_id, &user.account_id, 50).await?;
//!     assert_eq!(granted.new_balance, 60);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Non-negative balances**: `credits` is a `u64` and consume fails at zero
//! - **No lost updates**: every mutation is a version-conditioned store write,
//!   retried from a fresh read on conflict
//! - **Single session**: a login overwrites the stored token digest; older
//!   tokens fail with `SessionInvalidated`
//! - **Railway Programming**: all operations return `Result<T, AccountError>`

pub mod account;
pub mod config;
pub mod credential;
pub mod error;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use account::{Account, AccountId, AccountSummary, Principal, Role, SessionAuthority};
pub use config::CreditsConfig;
pub use credential::{Argon2Verifier, CredentialVerifier};
pub use error::{AccountError, ErrorKind, Result};
pub use service::{AccountService, ConsumeOutcome, GrantOutcome, LoginOutcome, CONSUME_MESSAGE};
pub use store::{AccountStore, UpdateOutcome};

#[cfg(feature = "memory-store")]
pub use store::MemoryStore;

#[cfg(feature = "sled-store")]
pub use store::SledStore;
