//! Error types for polarway-credits — Railway Programming
//!
//! All operations return `Result<T, AccountError>`.
//! Business-rule failures are terminal; only version conflicts are retried,
//! and exhausting those retries surfaces as [`AccountError::Conflict`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all account operations
#[derive(Error, Debug)]
pub enum AccountError {
    // ─── Account Errors ───

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    // ─── Auth Errors ───

    /// Bad credential, unknown login email, missing session or insufficient role.
    #[error("Unauthorized")]
    Unauthorized,

    /// The presented session was superseded by a newer login.
    #[error("Session invalidated: another login was detected for this account")]
    SessionInvalidated,

    // ─── Ledger Errors ───

    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("Invalid amount: {0} (must be >= 1)")]
    InvalidAmount(i64),

    #[error("Update conflict on account {account_id} after {attempts} attempts")]
    Conflict { account_id: String, attempts: u32 },

    // ─── Infrastructure Errors ───

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fieldless failure kind, always determinable from an [`AccountError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AccountNotFound,
    AccountAlreadyExists,
    Unauthorized,
    SessionInvalidated,
    InsufficientCredits,
    InvalidAmount,
    Conflict,
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountNotFound => "account_not_found",
            Self::AccountAlreadyExists => "account_already_exists",
            Self::Unauthorized => "unauthorized",
            Self::SessionInvalidated => "session_invalidated",
            Self::InsufficientCredits => "insufficient_credits",
            Self::InvalidAmount => "invalid_amount",
            Self::Conflict => "conflict",
            Self::Infrastructure => "infrastructure",
        }
    }

    /// Canonical HTTP status for transport shells
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized | Self::SessionInvalidated => 401,
            Self::InsufficientCredits => 402,
            Self::AccountNotFound => 404,
            Self::AccountAlreadyExists | Self::Conflict => 409,
            Self::InvalidAmount => 400,
            Self::Infrastructure => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_) => ErrorKind::AccountNotFound,
            Self::AccountAlreadyExists(_) => ErrorKind::AccountAlreadyExists,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::SessionInvalidated => ErrorKind::SessionInvalidated,
            Self::InsufficientCredits(_) => ErrorKind::InsufficientCredits,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Storage(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// `SessionInvalidated` is a subtype of `Unauthorized`
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionInvalidated)
    }
}

#[cfg(feature = "sled-store")]
impl From<sled::Error> for AccountError {
    fn from(err: sled::Error) -> Self {
        AccountError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AccountError {
    fn from(err: serde_json::Error) -> Self {
        AccountError::Serialization(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AccountError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AccountError::Unauthorized
    }
}

/// Result type alias for account operations
pub type Result<T> = std::result::Result<T, AccountError>;
