//! Structured logging bootstrap.
//!
//! Thin wrapper over `tracing`: level filtering via `RUST_LOG` with a
//! sensible default, compact output, idempotent initialization. Logs are
//! diagnostics only; nothing in the generation contract depends on them.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info,dungeon_core=debug";

/// Initialize tracing with default settings. Safe to call repeatedly; the
/// first call wins, and an already-installed global subscriber is left
/// alone.
pub fn init_tracing_default() {
    init_tracing(DEFAULT_FILTER);
}

/// Initialize tracing with a custom filter string (first call wins).
pub fn init_tracing(filter: &str) {
    let filter = filter.to_string();
    TRACING_INIT.call_once(move || {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact();
        let _ = subscriber.try_init();
    });
}
