//! Database configuration module for the time-credit ledger.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`. The composite unique indexes the ledger
//! relies on for insert-if-absent writes cannot be expressed on the entities, so
//! they are created explicitly right after the tables.

use crate::entities::{
    Application, ApplicationColumn, LedgerEntry, Offer, TimeBalance, Transaction,
    TransactionColumn,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/timebank.sqlite?mode=rwc";

/// Name of the unique index backing the (offer, provider) idempotency key
pub const TRANSACTION_OFFER_PROVIDER_INDEX: &str = "idx_transactions_offer_provider";

/// Name of the unique index allowing one application per (offer, applicant)
pub const APPLICATION_OFFER_APPLICANT_INDEX: &str = "idx_applications_offer_applicant";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    tracing::debug!(url = %database_url, "connecting to ledger store");
    Database::connect(&database_url).await.map_err(Into::into)
}

fn unique_pair_index<E, C>(name: &str, entity: E, first: C, second: C) -> IndexCreateStatement
where
    E: EntityTrait,
    C: sea_orm::ColumnTrait,
{
    Index::create()
        .if_not_exists()
        .name(name)
        .table(entity)
        .col(first)
        .col(second)
        .unique()
        .to_owned()
}

/// Creates all ledger tables and their unique indexes if they do not exist yet.
///
/// Tables are created parents first so foreign keys resolve: offers,
/// applications, transactions, then the balance tables.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = [
        schema.create_table_from_entity(Offer),
        schema.create_table_from_entity(Application),
        schema.create_table_from_entity(Transaction),
        schema.create_table_from_entity(TimeBalance),
        schema.create_table_from_entity(LedgerEntry),
    ];
    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    let indexes = [
        unique_pair_index(
            TRANSACTION_OFFER_PROVIDER_INDEX,
            Transaction,
            TransactionColumn::OfferId,
            TransactionColumn::ProviderId,
        ),
        unique_pair_index(
            APPLICATION_OFFER_APPLICANT_INDEX,
            Application,
            ApplicationColumn::OfferId,
            ApplicationColumn::ApplicantId,
        ),
    ];
    for index in &indexes {
        db.execute(builder.build(index)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{
        application::Model as ApplicationModel, ledger_entry::Model as LedgerEntryModel,
        offer::Model as OfferModel, time_balance::Model as TimeBalanceModel,
        transaction::Model as TransactionModel,
    };
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<OfferModel> = Offer::find().limit(1).all(&db).await?;
        let _: Vec<ApplicationModel> = Application::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;
        let _: Vec<TimeBalanceModel> = TimeBalance::find().limit(1).all(&db).await?;
        let _: Vec<LedgerEntryModel> = LedgerEntry::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[test]
    fn test_unique_index_statement() {
        let stmt = unique_pair_index(
            TRANSACTION_OFFER_PROVIDER_INDEX,
            Transaction,
            TransactionColumn::OfferId,
            TransactionColumn::ProviderId,
        );
        let sql = sea_orm::DatabaseBackend::Sqlite.build(&stmt).to_string();
        assert!(sql.contains("UNIQUE"));
        assert!(sql.contains("\"offer_id\""));
        assert!(sql.contains("\"provider_id\""));
    }
}
