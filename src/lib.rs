// Finance Ledger - Core Library
// Exposes the ledger store for use in the CLI/TUI, the API server, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod movement;
pub mod schema;

// Re-export commonly used types
pub use config::LedgerConfig;
pub use db::{LedgerStore, LegacyMigration};
pub use error::{LedgerError, StorageError};
pub use logging::init_logging;
pub use movement::{format_money, Kind, Movement, Totals, TIMESTAMP_FORMAT};
pub use schema::{parse_amount, validate_amount, validate_description, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
