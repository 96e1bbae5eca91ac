//! Ledger entry entity - One applied credit, keyed by its idempotency key.
//!
//! Inserting an entry is how the ledger records that a credit happened; the
//! unique key makes a second application of the same credit a no-op.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Idempotency key, e.g. `"claim:42"` or `"grant:alice"`
    #[sea_orm(unique)]
    pub idempotency_key: String,
    /// Profile ID credited
    pub user_id: String,
    /// Credited amount
    pub amount: i64,
    /// When the credit was applied
    pub created_at: DateTimeUtc,
}

/// `LedgerEntry` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
