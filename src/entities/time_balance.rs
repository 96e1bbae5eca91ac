//! Time balance entity - One spendable balance per user.
//!
//! Only the balance ledger writes this table. The counter is a cache of the
//! ledger entries and can always be rebuilt by replaying claimed transactions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Time balance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "time_balances")]
pub struct Model {
    /// Profile ID owning the balance
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Spendable credits
    pub balance: i64,
    /// When the row was materialized
    pub created_at: DateTimeUtc,
    /// When the balance last changed
    pub updated_at: DateTimeUtc,
}

/// `TimeBalance` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
