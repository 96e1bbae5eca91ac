//! Transaction repository - Idempotent creation and one-way claiming of exchange records.
//!
//! A transaction is identified for idempotency purposes by (`offer_id`, `provider_id`).
//! Creation is a single `INSERT ... ON CONFLICT DO NOTHING` against the unique index
//! on that pair, followed by a point read, so two concurrent completions can never
//! both insert. Claiming is a conditional `UPDATE ... WHERE claimed = false`, so a
//! transaction flips to claimed at most once no matter how often it is requested.

use crate::{
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use sea_orm::{
    QueryOrder, Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};

/// Fields needed to record a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Offer the exchange settles
    pub offer_id: i64,
    /// Provider who earns the credits
    pub provider_id: String,
    /// Requester (offer owner)
    pub requester_id: String,
    /// Credit amount in hours
    pub hours: i64,
    /// Service label
    pub service: String,
}

/// Result of a conditional claim flip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimFlip {
    /// This call moved the transaction from unclaimed to claimed
    Claimed(transaction::Model),
    /// The transaction was already claimed; nothing was written
    AlreadyClaimed(transaction::Model),
}

impl ClaimFlip {
    /// The transaction row after the flip attempt.
    #[must_use]
    pub const fn transaction(&self) -> &transaction::Model {
        match self {
            Self::Claimed(tx) | Self::AlreadyClaimed(tx) => tx,
        }
    }
}

/// Returns the transaction for (`offer_id`, `provider_id`), inserting an unclaimed one
/// if none exists.
///
/// The insert is conditional on the unique (offer, provider) index, so concurrent
/// callers converge on the same row. The returned model is always the stored row,
/// which means a retried call sees the original amount and timestamp rather than
/// the values it passed in.
pub async fn find_or_create<C>(db: &C, new: NewTransaction) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    if new.hours <= 0 {
        return Err(Error::InvalidAmount { amount: new.hours });
    }

    let offer_id = new.offer_id;
    let provider_id = new.provider_id.clone();
    let row = transaction::ActiveModel {
        offer_id: Set(Some(new.offer_id)),
        user_id: Set(new.requester_id),
        provider_id: Set(new.provider_id),
        service: Set(new.service),
        hours: Set(new.hours),
        created_at: Set(chrono::Utc::now()),
        claimed: Set(false),
        claimed_at: Set(None),
        ..Default::default()
    };

    let inserted = Transaction::insert(row)
        .on_conflict(
            OnConflict::columns([
                transaction::Column::OfferId,
                transaction::Column::ProviderId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let stored = find_for_offer_and_provider(db, offer_id, &provider_id)
        .await?
        .ok_or_else(|| Error::ConflictRetry {
            entity: "transaction",
            key: format!("{offer_id}:{provider_id}"),
        })?;

    if inserted == 0 {
        tracing::debug!(
            transaction_id = stored.id,
            offer_id,
            provider_id = %provider_id,
            "transaction already recorded"
        );
    } else {
        tracing::info!(
            transaction_id = stored.id,
            offer_id,
            provider_id = %provider_id,
            hours = stored.hours,
            "transaction recorded"
        );
    }

    Ok(stored)
}

/// Flips `claimed` from false to true.
///
/// Returns [`ClaimFlip::AlreadyClaimed`] with the untouched row when another call got
/// there first. Fails with `NotFound` only when the transaction does not exist.
pub async fn mark_claimed<C>(db: &C, transaction_id: i64) -> Result<ClaimFlip>
where
    C: ConnectionTrait,
{
    let result = Transaction::update_many()
        .col_expr(transaction::Column::Claimed, Expr::value(true))
        .col_expr(
            transaction::Column::ClaimedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Claimed.eq(false))
        .exec(db)
        .await?;

    let stored = Transaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;

    if result.rows_affected == 0 {
        Ok(ClaimFlip::AlreadyClaimed(stored))
    } else {
        Ok(ClaimFlip::Claimed(stored))
    }
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction_by_id<C>(
    db: &C,
    transaction_id: i64,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Looks up the transaction recorded for an (offer, provider) pair.
pub async fn find_for_offer_and_provider<C>(
    db: &C,
    offer_id: i64,
    provider_id: &str,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::OfferId.eq(offer_id))
        .filter(transaction::Column::ProviderId.eq(provider_id))
        .order_by_asc(transaction::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All transactions recorded for an (offer, provider) pair.
///
/// More than one row means the idempotency key was violated by a store without
/// the unique index; callers treat that as an invariant violation.
pub async fn list_for_offer_and_provider<C>(
    db: &C,
    offer_id: i64,
    provider_id: &str,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::OfferId.eq(offer_id))
        .filter(transaction::Column::ProviderId.eq(provider_id))
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Exchanges the user delivered, newest first (the "by you" list).
pub async fn list_provided_by<C>(db: &C, provider_id: &str) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::ProviderId.eq(provider_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Exchanges the user requested, newest first (the "for you" list).
pub async fn list_requested_by<C>(db: &C, requester_id: &str) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(requester_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Total hours of claimed transactions where the user is the provider.
pub async fn claimed_hours_for<C>(db: &C, provider_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let claimed = Transaction::find()
        .filter(transaction::Column::ProviderId.eq(provider_id))
        .filter(transaction::Column::Claimed.eq(true))
        .all(db)
        .await?;
    Ok(claimed.iter().map(|tx| tx.hours).sum())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_for(offer_id: i64, provider: &str, hours: i64) -> NewTransaction {
        NewTransaction {
            offer_id,
            provider_id: provider.to_string(),
            requester_id: "owner".to_string(),
            hours,
            service: "Gardening".to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_or_create_rejects_non_positive_hours() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = find_or_create(&db, new_for(1, "provider", 0)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));

        let result = find_or_create(&db, new_for(1, "provider", -3)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -3 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 3).await?;

        let first = find_or_create(&db, new_for(offer.id, "provider", 3)).await?;
        // A retry with different values still returns the stored row.
        let second = find_or_create(&db, new_for(offer.id, "provider", 99)).await?;

        assert_eq!(first, second);
        assert_eq!(second.hours, 3);
        assert!(!second.claimed);
        assert_eq!(
            list_for_offer_and_provider(&db, offer.id, "provider")
                .await?
                .len(),
            1
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_find_or_create_concurrent_calls_converge() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 2).await?;

        let (a, b) = tokio::join!(
            find_or_create(&db, new_for(offer.id, "provider", 2)),
            find_or_create(&db, new_for(offer.id, "provider", 2)),
        );

        assert_eq!(a?.id, b?.id);
        assert_eq!(Transaction::find().all(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_different_providers_get_separate_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 2).await?;

        let first = find_or_create(&db, new_for(offer.id, "provider_a", 2)).await?;
        let second = find_or_create(&db, new_for(offer.id, "provider_b", 2)).await?;

        assert_ne!(first.id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_claimed_flips_once() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 4).await?;
        let tx = find_or_create(&db, new_for(offer.id, "provider", 4)).await?;

        let first = mark_claimed(&db, tx.id).await?;
        assert!(matches!(first, ClaimFlip::Claimed(_)));
        assert!(first.transaction().claimed);
        assert!(first.transaction().claimed_at.is_some());

        let second = mark_claimed(&db, tx.id).await?;
        assert!(matches!(second, ClaimFlip::AlreadyClaimed(_)));
        assert_eq!(
            second.transaction().claimed_at,
            first.transaction().claimed_at
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_mark_claimed_missing_transaction() -> Result<()> {
        let db = setup_test_db().await?;

        let result = mark_claimed(&db, 404).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "transaction",
                id: 404
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_provided_and_requested_lists() -> Result<()> {
        let db = setup_test_db().await?;
        let first_offer = create_test_offer(&db, "owner", 1).await?;
        let second_offer = create_test_offer(&db, "owner", 2).await?;

        let older = find_or_create(&db, new_for(first_offer.id, "provider", 1)).await?;
        let newer = find_or_create(&db, new_for(second_offer.id, "provider", 2)).await?;

        let provided = list_provided_by(&db, "provider").await?;
        assert_eq!(provided, vec![newer, older]);

        let requested = list_requested_by(&db, "owner").await?;
        assert_eq!(requested.len(), 2);
        assert!(list_requested_by(&db, "provider").await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_claimed_hours_only_counts_claimed() -> Result<()> {
        let db = setup_test_db().await?;
        let first_offer = create_test_offer(&db, "owner", 3).await?;
        let second_offer = create_test_offer(&db, "owner", 5).await?;

        let claimed = find_or_create(&db, new_for(first_offer.id, "provider", 3)).await?;
        find_or_create(&db, new_for(second_offer.id, "provider", 5)).await?;
        mark_claimed(&db, claimed.id).await?;

        assert_eq!(claimed_hours_for(&db, "provider").await?, 3);
        assert_eq!(claimed_hours_for(&db, "someone_else").await?, 0);
        Ok(())
    }
}
