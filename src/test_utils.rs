//! Shared test utilities for the time bank ledger.
//!
//! Helpers for setting up an in-memory store and walking offers through the
//! marketplace flow with sensible defaults.

use crate::{
    config::settings::LedgerSettings,
    core::offer::{self, NewOffer},
    entities::{application, offer as offer_entity},
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Settings with no starting grant, so balances equal claimed credits.
#[must_use]
pub fn test_settings() -> LedgerSettings {
    LedgerSettings {
        starting_grant: 0,
        retry_backoff_ms: 1,
        ..LedgerSettings::default()
    }
}

/// Creates an available offer owned by `owner_id`.
///
/// # Defaults
/// * `title`: "Test offer"
/// * `service_type`: "Cooking"
pub async fn create_test_offer(
    db: &DatabaseConnection,
    owner_id: &str,
    time_credits: i64,
) -> Result<offer_entity::Model> {
    offer::create_offer(
        db,
        owner_id,
        NewOffer {
            title: "Test offer".to_string(),
            description: "Created by a test".to_string(),
            service_type: "Cooking".to_string(),
            time_credits,
        },
    )
    .await
}

/// Creates an offer, applies `provider_id` to it, and accepts the application.
/// Returns (offer, accepted application) ready for completion.
pub async fn create_accepted_offer(
    db: &DatabaseConnection,
    owner_id: &str,
    provider_id: &str,
    time_credits: i64,
) -> Result<(offer_entity::Model, application::Model)> {
    let created = create_test_offer(db, owner_id, time_credits).await?;
    let applied = offer::apply_to_offer(db, created.id, provider_id).await?;
    let accepted = offer::accept_application(db, applied.id, owner_id).await?;
    Ok((created, accepted))
}
