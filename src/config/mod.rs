/// Database configuration and connection management
pub mod database;

/// Ledger tunables loaded from timebank.toml
pub mod settings;
