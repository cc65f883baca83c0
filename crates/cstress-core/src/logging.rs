//! Logging init: tracing diagnostics on stderr; stdout belongs to the reporter.

use tracing_subscriber::EnvFilter;

/// Initialize diagnostic logging to stderr. ANSI is off so redirected output
/// stays clean; report lines are unaffected.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cstress_core=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
