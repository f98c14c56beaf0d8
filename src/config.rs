//! Ledger configuration
//!
//! Where the database lives, how chatty logging is, and where the HTTP shell
//! listens. Values come from `FINANCE_LEDGER_*` environment variables; the
//! command line can override the database path.

use std::env;
use std::path::PathBuf;

pub const ENV_DB: &str = "FINANCE_LEDGER_DB";
pub const ENV_LOG: &str = "FINANCE_LEDGER_LOG";
pub const ENV_ADDR: &str = "FINANCE_LEDGER_ADDR";

/// Same file name the original desktop app used
pub const DEFAULT_DB_FILE: &str = "finanzas.db";
pub const DEFAULT_LOG_FILTER: &str = "finance_ledger=warn";
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// SQLite file backing the store
    pub db_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Listen address for `ledger-server`
    pub server_addr: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            server_addr: DEFAULT_ADDR.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Load from the process environment. `RUST_LOG` is honoured when
    /// `FINANCE_LEDGER_LOG` is unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map here)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            db_path: non_empty(ENV_DB).map(PathBuf::from).unwrap_or(defaults.db_path),
            log_filter: non_empty(ENV_LOG)
                .or_else(|| non_empty("RUST_LOG"))
                .unwrap_or(defaults.log_filter),
            server_addr: non_empty(ENV_ADDR).unwrap_or(defaults.server_addr),
        }
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}
