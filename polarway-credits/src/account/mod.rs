//! Account aggregate — identity, credit ledger, and single-session login
//!
//! The transitions here are pure: they mutate an in-memory copy and bump its
//! version. The service persists each result with one conditional update.

pub mod types;
pub mod ledger;
pub mod session;

pub use ledger::grant_amount;
pub use session::{token_digest, IssuedSession, SessionAuthority, SessionClaims};
pub use types::{require_role, Account, AccountId, AccountSummary, Principal, Role};
