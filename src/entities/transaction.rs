//! Transaction entity - The record of one completed exchange.
//!
//! Each transaction links a requester (`user_id`) and a provider through the
//! offer they exchanged on. (`offer_id`, `provider_id`) is the idempotency key
//! and carries a unique index. Rows are never deleted; the only mutation is the
//! one-way `claimed` flip.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Offer this exchange settled, if still known
    pub offer_id: Option<i64>,
    /// Profile ID of the requester (offer owner)
    pub user_id: String,
    /// Profile ID of the provider who earns the credits
    pub provider_id: String,
    /// Service label copied from the offer
    pub service: String,
    /// Credit amount in hours, always positive
    pub hours: i64,
    /// When the exchange was recorded
    pub created_at: DateTimeUtc,
    /// Whether the provider has moved the credits into their balance
    pub claimed: bool,
    /// When the credits were claimed
    pub claimed_at: Option<DateTimeUtc>,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction settles at most one offer
    #[sea_orm(
        belongs_to = "super::offer::Entity",
        from = "Column::OfferId",
        to = "super::offer::Column::Id"
    )]
    Offer,
}

impl Related<super::offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
