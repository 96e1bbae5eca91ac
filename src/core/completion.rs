//! Offer completion - Turning an accepted exchange into a transaction record.
//!
//! Completion runs in one store transaction: validate the caller and the accepted
//! applicant, flip the offer to completed with a status-guarded update, and upsert
//! the (offer, provider) transaction. A retry after any failure resumes instead of
//! failing: if the offer is already completed the flip is skipped, the upsert
//! returns the existing row, and the call reports [`CompletionStatus::AlreadyCompleted`].
//!
//! Completion does not move the provider's balance. The credit is applied when the
//! provider claims, keyed by this transaction's id, so no number of completion
//! retries can credit twice.

use crate::{
    core::{
        offer::accepted_applications,
        transaction::{self as transactions, NewTransaction},
    },
    entities::{Offer, OfferStatus, offer, transaction},
    errors::{Error, Result},
};
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};

/// Whether this call performed the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// This call flipped the offer to completed
    Completed,
    /// The offer was already completed; the existing record was returned
    AlreadyCompleted,
}

/// Result of [`complete_offer`], enough for a caller to render without re-querying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Whether this call did the work
    pub status: CompletionStatus,
    /// Offer that was completed
    pub offer_id: i64,
    /// Transaction recording the exchange
    pub transaction_id: i64,
    /// Provider who can now claim the credits
    pub provider_id: String,
    /// Credits the provider can claim
    pub credits_transferred: i64,
    /// Full transaction row
    pub transaction: transaction::Model,
}

/// Completes an offer on behalf of its owner and records the exchange.
///
/// # Errors
/// - `NotFound` if the offer does not exist
/// - `Unauthorized` if `requester_id` does not own the offer
/// - `NoAcceptedApplicant` if no application was accepted
#[tracing::instrument(skip(db))]
pub async fn complete_offer(
    db: &DatabaseConnection,
    offer_id: i64,
    requester_id: &str,
) -> Result<Completion> {
    let txn = db.begin().await?;

    let offer = Offer::find_by_id(offer_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "offer",
            id: offer_id,
        })?;

    if offer.owner_id != requester_id {
        return Err(Error::Unauthorized {
            user_id: requester_id.to_string(),
            action: "complete this offer",
        });
    }

    let accepted = accepted_applications(&txn, offer_id).await?;
    let Some(provider) = accepted.first() else {
        return Err(Error::NoAcceptedApplicant { offer_id });
    };
    if accepted.len() > 1 {
        tracing::warn!(
            offer_id,
            accepted = accepted.len(),
            provider_id = %provider.applicant_id,
            "several accepted applications, completing with the earliest"
        );
    }

    let flipped = Offer::update_many()
        .col_expr(offer::Column::Status, Expr::value(OfferStatus::Completed))
        .col_expr(offer::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(offer::Column::Id.eq(offer_id))
        .filter(offer::Column::Status.ne(OfferStatus::Completed))
        .exec(&txn)
        .await?
        .rows_affected
        > 0;

    if !flipped {
        tracing::info!(offer_id, "offer already completed, resuming from transaction step");
    }

    let recorded = transactions::find_or_create(
        &txn,
        NewTransaction {
            offer_id,
            provider_id: provider.applicant_id.clone(),
            requester_id: offer.owner_id.clone(),
            hours: offer.time_credits,
            service: offer.service_type.clone(),
        },
    )
    .await?;

    txn.commit().await?;

    let status = if flipped {
        CompletionStatus::Completed
    } else {
        CompletionStatus::AlreadyCompleted
    };
    tracing::info!(
        offer_id,
        transaction_id = recorded.id,
        provider_id = %recorded.provider_id,
        credits = recorded.hours,
        ?status,
        "offer completion settled"
    );

    Ok(Completion {
        status,
        offer_id,
        transaction_id: recorded.id,
        provider_id: recorded.provider_id.clone(),
        credits_transferred: recorded.hours,
        transaction: recorded,
    })
}
