//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Claiming, balances, history, and reconciliation commands
pub mod credits;

/// General utility commands
pub mod general;

/// Offer marketplace commands
pub mod offer;

// Export commands
pub use credits::*;
pub use general::*;
pub use offer::*;
