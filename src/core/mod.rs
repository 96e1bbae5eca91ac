//! Core business logic - framework-agnostic ledger operations
//!
//! Everything here talks to the store through `sea_orm` and knows nothing about
//! Discord. Front ends go through [`timebank::TimeBank`].

/// Claiming earned credits into a balance
pub mod claim;
/// Offer completion and transaction recording
pub mod completion;
/// Caller identity resolution
pub mod identity;
/// Balances, ledger entries, and balance reconciliation
pub mod ledger;
/// Change notifications for observers
pub mod notify;
/// Offers and applications
pub mod offer;
/// Server-side reconciliation sweep
pub mod reconcile;
/// Store timeouts and retry with backoff
pub mod resilience;
/// Facade tying identity, workflows, and notifications together
pub mod timebank;
/// Transaction records
pub mod transaction;
