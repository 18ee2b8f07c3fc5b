//! Tracing bootstrap, grounded on `ando-server::main`'s
//! `tracing_subscriber::fmt().with_env_filter(...)` setup.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides
/// `log_level` when set, matching the teacher's precedence.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
