//! Offer entity - A posted request for a service, priced in time credits.
//!
//! Offers are created by their owner and move to `completed` exactly once, when
//! an accepted applicant has delivered the service. The credit value never
//! changes after creation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an offer
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OfferStatus {
    /// Open for applications
    #[sea_orm(string_value = "available")]
    Available,
    /// At least one application has been received
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Service delivered and a transaction recorded (terminal)
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Offer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    /// Unique identifier for the offer
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Profile ID of the user who posted the offer (the requester)
    pub owner_id: String,
    /// Short title shown on offer cards
    pub title: String,
    /// Free-form description of the requested service
    pub description: String,
    /// Service category, also used as the transaction's service label
    pub service_type: String,
    /// Credit value in hours, always positive
    pub time_credits: i64,
    /// Current lifecycle state
    pub status: OfferStatus,
    /// When the offer was posted
    pub created_at: DateTimeUtc,
    /// When the offer last changed state
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Offer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One offer has many applications
    #[sea_orm(has_many = "super::application::Entity")]
    Applications,
    /// One offer has many transactions (one in steady state)
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
