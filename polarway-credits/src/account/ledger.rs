//! Credit ledger transitions — consume and grant
//!
//! Pure state transitions on an [`Account`]. They validate, mutate, bump the
//! version and refresh `updated_at`; persisting the result is the caller's job
//! and must go through the store's conditional update.

use crate::error::{AccountError, Result};

use super::types::{require_role, Account, Role};

/// Validate a grant amount, returning it as an unsigned credit count
pub fn grant_amount(amount: i64) -> Result<u64> {
    if amount <= 0 {
        return Err(AccountError::InvalidAmount(amount));
    }
    u64::try_from(amount).map_err(|_| AccountError::InvalidAmount(amount))
}

impl Account {
    /// Spend exactly one credit. Returns the new balance.
    pub fn consume_credit(&mut self) -> Result<u64> {
        if !self.has_credits() {
            return Err(AccountError::InsufficientCredits(self.id.clone()));
        }
        self.credits -= 1;
        self.bump();
        Ok(self.credits)
    }

    /// Add `amount` credits on behalf of a grantor holding `grantor_role`.
    ///
    /// Authorization is checked before the amount, so a non-admin never
    /// learns anything about amount validation.
    pub fn add_credits(&mut self, amount: i64, grantor_role: Role) -> Result<u64> {
        require_role(grantor_role, Role::Admin)?;
        let amount = grant_amount(amount)?;
        let credits = self
            .credits
            .checked_add(amount)
            .ok_or(AccountError::InvalidAmount(amount as i64))?;
        self.credits = credits;
        self.bump();
        Ok(self.credits)
    }

    /// Advance the version and timestamp after a mutation
    pub(crate) fn bump(&mut self) {
        self.version += 1;
        self.touch();
    }
}
