//! Claim workflow - A provider moving earned credits into their balance.
//!
//! Per transaction the state machine is `Unclaimed -> Claimed`, with no way back.
//! A claim runs in one store transaction: conditional flip of `claimed`, then a
//! ledger credit keyed by the transaction id. The flip comes first because a
//! claimed-but-uncredited row is repaired by balance reconciliation, whereas a
//! credited-but-unclaimed row would invite a second credit on retry.
//!
//! Claims never create transactions. A provider claiming an offer with no
//! recorded transaction gets `TransactionNotFound` and the owner re-runs completion.

use crate::{
    core::{
        ledger::{self, CreditOutcome},
        transaction::{self as transactions, ClaimFlip},
    },
    errors::{Error, Result},
};
use sea_orm::{DatabaseConnection, TransactionTrait};

/// Whether this call performed the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    /// This call claimed the credits
    Claimed,
    /// The credits had already been claimed; nothing changed
    AlreadyClaimed,
}

/// Result of a claim, enough for a caller to render without re-querying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// Whether this call did the work
    pub status: ClaimStatus,
    /// Claimed transaction
    pub transaction_id: i64,
    /// Provider who was credited
    pub provider_id: String,
    /// Credits on the transaction
    pub amount: i64,
    /// Provider's balance after the call
    pub balance: i64,
}

/// Claims the credits of one transaction for its provider.
///
/// # Errors
/// - `NotFound` if the transaction does not exist (nothing is written)
/// - `Forbidden` if `caller_id` is not the transaction's provider (nothing is written)
#[tracing::instrument(skip(db))]
pub async fn claim(
    db: &DatabaseConnection,
    transaction_id: i64,
    caller_id: &str,
    starting_grant: i64,
) -> Result<ClaimReceipt> {
    let txn = db.begin().await?;

    let existing = transactions::get_transaction_by_id(&txn, transaction_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;

    if existing.provider_id != caller_id {
        tracing::warn!(
            transaction_id,
            caller_id,
            provider_id = %existing.provider_id,
            "claim attempted by someone other than the provider"
        );
        return Err(Error::Forbidden {
            entity: "transaction",
            id: transaction_id,
            user_id: caller_id.to_string(),
        });
    }

    let flip = transactions::mark_claimed(&txn, transaction_id).await?;
    let (status, balance) = match &flip {
        ClaimFlip::Claimed(tx) => {
            let outcome = ledger::credit_in(
                &txn,
                &tx.provider_id,
                tx.hours,
                &ledger::claim_key(tx.id),
                starting_grant,
            )
            .await?;
            if let CreditOutcome::Duplicate(_) = outcome {
                tracing::warn!(
                    transaction_id,
                    "credit was applied before the claim flag was set"
                );
            }
            (ClaimStatus::Claimed, outcome.balance())
        }
        ClaimFlip::AlreadyClaimed(tx) => (
            ClaimStatus::AlreadyClaimed,
            ledger::balance_in(&txn, &tx.provider_id, starting_grant).await?,
        ),
    };

    txn.commit().await?;

    let tx = flip.transaction();
    tracing::info!(transaction_id, amount = tx.hours, balance, ?status, "claim settled");
    Ok(ClaimReceipt {
        status,
        transaction_id,
        provider_id: tx.provider_id.clone(),
        amount: tx.hours,
        balance,
    })
}

/// Claims the caller's credits for an offer, looking the transaction up by
/// (offer, caller).
///
/// # Errors
/// - `TransactionNotFound` if completion has not recorded a transaction yet
/// - `InvariantViolation` if more than one transaction exists for the pair
pub async fn claim_for_offer(
    db: &DatabaseConnection,
    offer_id: i64,
    caller_id: &str,
    starting_grant: i64,
) -> Result<ClaimReceipt> {
    let recorded = transactions::list_for_offer_and_provider(db, offer_id, caller_id).await?;

    match recorded.as_slice() {
        [] => Err(Error::TransactionNotFound {
            offer_id,
            provider_id: caller_id.to_string(),
        }),
        [only] => claim(db, only.id, caller_id, starting_grant).await,
        many => {
            let ids: Vec<i64> = many.iter().map(|tx| tx.id).collect();
            tracing::error!(offer_id, caller_id, ?ids, "duplicate transactions for one offer");
            Err(Error::InvariantViolation {
                message: format!(
                    "offer {offer_id} has {} transactions for provider {caller_id}: {ids:?}",
                    many.len()
                ),
            })
        }
    }
}
