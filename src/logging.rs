//! Structured logging setup (SPEC_FULL §A.1), mirroring the teacher's
//! `otel.rs` `LogFormat` switch minus OTLP transport — that's a concern of
//! the host application's wiring, not this routing core.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install a global `tracing_subscriber::fmt` layer. Safe to call more
/// than once; subsequent calls are no-ops (mirrors
/// `tracing::subscriber::set_global_default`'s own idempotence guard).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init(),
    };
    if let Err(err) = result {
        // Already initialised elsewhere (e.g. by the host application, or a
        // prior call); that's fine, not a failure of this crate.
        tracing::debug!(%err, "tracing subscriber already initialised");
    }
}
