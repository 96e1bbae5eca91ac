//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod application;
pub mod ledger_entry;
pub mod offer;
pub mod time_balance;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use application::{
    ApplicationStatus, Column as ApplicationColumn, Entity as Application,
    Model as ApplicationModel,
};
pub use ledger_entry::{
    Column as LedgerEntryColumn, Entity as LedgerEntry, Model as LedgerEntryModel,
};
pub use offer::{Column as OfferColumn, Entity as Offer, Model as OfferModel, OfferStatus};
pub use time_balance::{
    Column as TimeBalanceColumn, Entity as TimeBalance, Model as TimeBalanceModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
