//! Logging setup shared by the binaries

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr `fmt` subscriber filtered by `filter`.
///
/// Falls back to the default filter when the directive does not parse.
/// Calling this twice is not an error; the first subscriber stays.
pub fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_and_bad_filter() {
        init_logging("finance_ledger=debug");
        init_logging("not a [valid filter");
        tracing::debug!("logging initialised");
    }
}
