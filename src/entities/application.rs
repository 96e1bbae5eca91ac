//! Application entity - A bid by a user to fulfil an offer.
//!
//! There is at most one application per (offer, applicant), enforced by a
//! unique index created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review state of an application
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ApplicationStatus {
    /// Waiting for the offer owner
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Chosen by the offer owner to provide the service
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// Declined by the offer owner
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Application database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    /// Unique identifier for the application
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Offer being applied to
    pub offer_id: i64,
    /// Profile ID of the would-be provider
    pub applicant_id: String,
    /// Current review state
    pub status: ApplicationStatus,
    /// When the application was submitted
    pub created_at: DateTimeUtc,
    /// When the status last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Application and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each application belongs to one offer
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
