//! Balance ledger - The only writer of time balances.
//!
//! Every credit is recorded as a ledger entry with a unique idempotency key before
//! the balance counter moves, and both writes happen on the same connection or
//! transaction. A key that is already present turns the credit into a no-op, so
//! retries never double-credit. The counter is a cache: [`replay_balance`] rebuilds
//! it from the starting grant plus all claimed transactions, and
//! [`reconcile_balance`] repairs any drift it finds.

use crate::{
    core::transaction as transactions,
    entities::{LedgerEntry, TimeBalance, ledger_entry, time_balance},
    errors::{Error, Result},
};
use sea_orm::{
    Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};

/// Idempotency key for the one-time starting grant of a user.
#[must_use]
pub fn grant_key(user_id: &str) -> String {
    format!("grant:{user_id}")
}

/// Idempotency key for crediting a claimed transaction.
#[must_use]
pub fn claim_key(transaction_id: i64) -> String {
    format!("claim:{transaction_id}")
}

/// Outcome of a [`credit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// The credit was applied; holds the new balance
    Applied(i64),
    /// The key had already been applied; holds the unchanged balance
    Duplicate(i64),
}

impl CreditOutcome {
    /// Balance after the call, whichever way it went.
    #[must_use]
    pub const fn balance(self) -> i64 {
        match self {
            Self::Applied(balance) | Self::Duplicate(balance) => balance,
        }
    }
}

/// Counter versus replay comparison for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceCheck {
    /// User whose balance was checked
    pub user_id: String,
    /// Value stored in `time_balances` before the check
    pub recorded: i64,
    /// Value derived from the grant and claimed transactions
    pub replayed: i64,
    /// Whether the stored value was rewritten
    pub repaired: bool,
}

/// Inserts the user's balance row and grant entry if they are missing.
///
/// Both inserts are conditional, so concurrent first reads materialize the row
/// exactly once. Returns true when this call created the row.
async fn ensure_balance_row<C>(db: &C, user_id: &str, starting_grant: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    let row = time_balance::ActiveModel {
        user_id: Set(user_id.to_string()),
        balance: Set(starting_grant),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let inserted = TimeBalance::insert(row)
        .on_conflict(
            OnConflict::column(time_balance::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted == 0 {
        return Ok(false);
    }

    if starting_grant > 0 {
        record_entry(db, user_id, starting_grant, &grant_key(user_id)).await?;
    }
    tracing::info!(user_id, starting_grant, "time balance materialized");
    Ok(true)
}

/// Inserts a ledger entry unless its key exists. Returns true when inserted.
async fn record_entry<C>(db: &C, user_id: &str, amount: i64, idempotency_key: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let entry = ledger_entry::ActiveModel {
        idempotency_key: Set(idempotency_key.to_string()),
        user_id: Set(user_id.to_string()),
        amount: Set(amount),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let inserted = LedgerEntry::insert(entry)
        .on_conflict(
            OnConflict::column(ledger_entry::Column::IdempotencyKey)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

async fn read_balance<C>(db: &C, user_id: &str) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    Ok(TimeBalance::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .map(|row| row.balance))
}

/// Applies a credit on an existing connection or transaction.
///
/// Callers that are not already inside a store transaction should use [`credit`],
/// which wraps this in one so the entry and the counter move together.
pub async fn credit_in<C>(
    db: &C,
    user_id: &str,
    amount: i64,
    idempotency_key: &str,
    starting_grant: i64,
) -> Result<CreditOutcome>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    ensure_balance_row(db, user_id, starting_grant).await?;

    if !record_entry(db, user_id, amount, idempotency_key).await? {
        let balance = read_balance(db, user_id).await?.unwrap_or(starting_grant);
        tracing::debug!(user_id, idempotency_key, "credit already applied");
        return Ok(CreditOutcome::Duplicate(balance));
    }

    let updated = TimeBalance::update_many()
        .col_expr(
            time_balance::Column::Balance,
            Expr::col(time_balance::Column::Balance).add(amount),
        )
        .col_expr(
            time_balance::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(time_balance::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::ConflictRetry {
            entity: "time_balance",
            key: user_id.to_string(),
        });
    }

    let balance = read_balance(db, user_id)
        .await?
        .ok_or_else(|| Error::ConflictRetry {
            entity: "time_balance",
            key: user_id.to_string(),
        })?;
    tracing::info!(user_id, amount, idempotency_key, balance, "credit applied");
    Ok(CreditOutcome::Applied(balance))
}

/// Credits `amount` to `user_id` at most once per `idempotency_key`.
pub async fn credit(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
    idempotency_key: &str,
    starting_grant: i64,
) -> Result<CreditOutcome> {
    let txn = db.begin().await?;
    let outcome = credit_in(&txn, user_id, amount, idempotency_key, starting_grant).await?;
    txn.commit().await?;
    Ok(outcome)
}

/// Reads a balance on an existing connection, materializing it if needed.
pub async fn balance_in<C>(db: &C, user_id: &str, starting_grant: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    ensure_balance_row(db, user_id, starting_grant).await?;
    read_balance(db, user_id)
        .await?
        .ok_or_else(|| Error::ConflictRetry {
            entity: "time_balance",
            key: user_id.to_string(),
        })
}

/// Returns the user's balance, creating it with the starting grant on first read.
pub async fn get_balance(
    db: &DatabaseConnection,
    user_id: &str,
    starting_grant: i64,
) -> Result<i64> {
    let txn = db.begin().await?;
    let balance = balance_in(&txn, user_id, starting_grant).await?;
    txn.commit().await?;
    Ok(balance)
}

/// Derives a balance from the grant entry plus all claimed provider transactions.
pub async fn replay_balance<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    let grant = LedgerEntry::find()
        .filter(ledger_entry::Column::IdempotencyKey.eq(grant_key(user_id)))
        .one(db)
        .await?
        .map_or(0, |entry| entry.amount);
    let claimed = transactions::claimed_hours_for(db, user_id).await?;
    Ok(grant + claimed)
}

/// Compares the stored balance with its replay and rewrites it on divergence.
///
/// Returns `None` when the user has no balance row yet; there is nothing to drift.
pub async fn reconcile_balance(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Option<BalanceCheck>> {
    let txn = db.begin().await?;

    let Some(recorded) = read_balance(&txn, user_id).await? else {
        txn.rollback().await?;
        return Ok(None);
    };
    let replayed = replay_balance(&txn, user_id).await?;
    let repaired = recorded != replayed;

    if repaired {
        tracing::warn!(
            user_id,
            recorded,
            replayed,
            "balance drifted from the transaction log, rewriting from replay"
        );
        TimeBalance::update_many()
            .col_expr(time_balance::Column::Balance, Expr::value(replayed))
            .col_expr(
                time_balance::Column::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(time_balance::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok(Some(BalanceCheck {
        user_id: user_id.to_string(),
        recorded,
        replayed,
        repaired,
    }))
}

/// IDs of every user with a materialized balance.
pub async fn list_balance_holders<C>(db: &C) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    Ok(TimeBalance::find()
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.user_id)
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::transaction::{NewTransaction, find_or_create, mark_claimed};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_credit_rejects_non_positive_amounts() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = credit_in(&db, "alice", 0, "k", 30).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));

        let result = credit_in(&db, "alice", -5, "k", 30).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -5 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_first_read_materializes_grant_once() -> Result<()> {
        let db = setup_test_db().await?;

        assert_eq!(get_balance(&db, "alice", 30).await?, 30);
        // A later read with a different grant setting does not re-grant.
        assert_eq!(get_balance(&db, "alice", 50).await?, 30);

        let entries = LedgerEntry::find().all(&db).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].idempotency_key, grant_key("alice"));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_create_one_row() -> Result<()> {
        let db = setup_test_db().await?;

        let (a, b, c) = tokio::join!(
            get_balance(&db, "bob", 30),
            get_balance(&db, "bob", 30),
            get_balance(&db, "bob", 30),
        );
        assert_eq!((a?, b?, c?), (30, 30, 30));
        assert_eq!(TimeBalance::find().all(&db).await?.len(), 1);
        assert_eq!(LedgerEntry::find().all(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_grant_writes_no_grant_entry() -> Result<()> {
        let db = setup_test_db().await?;

        assert_eq!(get_balance(&db, "carol", 0).await?, 0);
        assert!(LedgerEntry::find().all(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_credit_same_key_applies_once() -> Result<()> {
        let db = setup_test_db().await?;

        let first = credit(&db, "alice", 3, "claim:1", 30).await?;
        let second = credit(&db, "alice", 3, "claim:1", 30).await?;
        let other = credit(&db, "alice", 2, "claim:2", 30).await?;

        assert_eq!(first, CreditOutcome::Applied(33));
        assert_eq!(second, CreditOutcome::Duplicate(33));
        assert_eq!(other.balance(), 35);
        assert_eq!(get_balance(&db, "alice", 30).await?, 35);
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() -> Result<()> {
        let db = setup_test_db().await?;
        let offer = create_test_offer(&db, "owner", 4).await?;
        let tx = find_or_create(
            &db,
            NewTransaction {
                offer_id: offer.id,
                provider_id: "alice".to_string(),
                requester_id: "owner".to_string(),
                hours: 4,
                service: "Tutoring".to_string(),
            },
        )
        .await?;
        mark_claimed(&db, tx.id).await?;
        credit(&db, "alice", 4, &claim_key(tx.id), 10).await?;

        // Simulate an out-of-band writer corrupting the counter.
        TimeBalance::update_many()
            .col_expr(time_balance::Column::Balance, Expr::value(999_i64))
            .filter(time_balance::Column::UserId.eq("alice"))
            .exec(&db)
            .await?;

        let check = reconcile_balance(&db, "alice").await?.unwrap();
        assert_eq!(check.recorded, 999);
        assert_eq!(check.replayed, 14);
        assert!(check.repaired);
        assert_eq!(get_balance(&db, "alice", 10).await?, 14);

        let again = reconcile_balance(&db, "alice").await?.unwrap();
        assert!(!again.repaired);
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_without_row_is_noop() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(reconcile_balance(&db, "nobody").await?.is_none());
        assert!(TimeBalance::find().all(&db).await?.is_empty());
        Ok(())
    }
}
