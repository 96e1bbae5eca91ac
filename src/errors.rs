//! Unified error types for the time-credit ledger.
//!
//! Every failure carries an [`ErrorKind`] so callers can decide between
//! surfacing, retrying, or escalating without matching on variants. Idempotent
//! no-ops (an offer that is already completed, a transaction that is already
//! claimed) are reported as outcome statuses and never appear here.

use sea_orm::{DbErr, SqlErr};
use std::fmt;
use thiserror::Error;

/// Coarse classification of an [`Error`], stable enough to show to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No authenticated caller
    Unauthenticated,
    /// Caller lacks permission for this entity
    Unauthorized,
    /// Caller is not the party allowed to act on this entity
    Forbidden,
    /// Referenced entity is absent
    NotFound,
    /// Completion precondition failed
    NoAcceptedApplicant,
    /// A conditional write lost a race
    ConflictRetry,
    /// Transient infrastructure failure
    StoreUnavailable,
    /// Stored data contradicts a ledger invariant
    InvariantViolation,
    /// Input rejected before touching the store
    InvalidInput,
    /// Anything else
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::NoAcceptedApplicant => "no_accepted_applicant",
            Self::ConflictRetry => "conflict_retry",
            Self::StoreUnavailable => "store_unavailable",
            Self::InvariantViolation => "invariant_violation",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("No authenticated user")]
    Unauthenticated,

    #[error("User {user_id} is not allowed to {action}")]
    Unauthorized { user_id: String, action: &'static str },

    #[error("User {user_id} may not act on {entity} {id}")]
    Forbidden {
        entity: &'static str,
        id: i64,
        user_id: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("No transaction recorded for offer {offer_id} and provider {provider_id}")]
    TransactionNotFound { offer_id: i64, provider_id: String },

    #[error("Offer {offer_id} has no accepted application")]
    NoAcceptedApplicant { offer_id: i64 },

    #[error("Concurrent update to {entity} {key}")]
    ConflictRetry { entity: &'static str, key: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Ledger invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("Invalid credit amount: {amount}")]
    InvalidAmount { amount: i64 },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl Error {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } | Self::TransactionNotFound { .. } => ErrorKind::NotFound,
            Self::NoAcceptedApplicant { .. } => ErrorKind::NoAcceptedApplicant,
            Self::ConflictRetry { .. } => ErrorKind::ConflictRetry,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            Self::InvalidAmount { .. } | Self::Validation { .. } => ErrorKind::InvalidInput,
            Self::Config { .. } | Self::Database { .. } | Self::Framework(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether repeating the same call may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StoreUnavailable | ErrorKind::ConflictRetry
        )
    }

    /// Human-readable message safe to show to end users.
    ///
    /// Store and framework failures are replaced with generic text so raw
    /// database errors never leak into the UI.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "You need to be signed in to do that.".to_string(),
            Self::Unauthorized { action, .. } => {
                format!("Only the offer owner is allowed to {action}.")
            }
            Self::Forbidden { entity, .. } => {
                format!("That {entity} belongs to someone else.")
            }
            Self::NotFound { entity, id } => format!("Could not find {entity} #{id}."),
            Self::TransactionNotFound { offer_id, .. } => format!(
                "No completed exchange is recorded for you on offer #{offer_id} yet. \
                 Ask the offer owner to complete it again."
            ),
            Self::NoAcceptedApplicant { offer_id } => {
                format!("Offer #{offer_id} has no accepted applicant yet.")
            }
            Self::ConflictRetry { .. } => {
                "Someone else updated this at the same time. Please try again.".to_string()
            }
            Self::StoreUnavailable { .. } => {
                "The ledger is temporarily unavailable. Please try again shortly.".to_string()
            }
            Self::InvariantViolation { .. } => {
                "This record needs manual review before it can be changed.".to_string()
            }
            Self::InvalidAmount { amount } => {
                format!("{amount} is not a valid number of credits.")
            }
            Self::Validation { message } => message.clone(),
            Self::Config { .. } | Self::Database { .. } | Self::Framework(_) => {
                "Something went wrong on our side.".to_string()
            }
        }
    }
}

impl From<DbErr> for Error {
    fn from(value: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = value.sql_err() {
            return Self::ConflictRetry {
                entity: "row",
                key: detail,
            };
        }
        match &value {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => Self::StoreUnavailable {
                message: value.to_string(),
            },
            _ => Self::Database {
                message: value.to_string(),
            },
        }
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
