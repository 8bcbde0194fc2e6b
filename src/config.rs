//! Environment-driven configuration (SPEC_FULL §A.3).

use std::env;
use tracing::warn;

const STRICT_QUERY_VAR: &str = "WAYFINDER_STRICT_QUERY_PARSING";
const LOG_FORMAT_VAR: &str = "WAYFINDER_LOG_FORMAT";

/// Output format for [`crate::logging::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Json
    }
}

/// Tunables for a [`crate::router::Router`] instance.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Whether a malformed `%xx` escape in a registered pattern's *query*
    /// values fails compilation (`true`, §4.1's default) or is passed
    /// through literally (`false`). Path segments are always strict —
    /// this only loosens tolerance for noisy query text, via
    /// [`crate::pattern::compile_with`].
    pub strict_query_parsing: bool,
    pub log_format: LogFormat,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            strict_query_parsing: true,
            log_format: LogFormat::default(),
        }
    }
}

impl RouterConfig {
    /// Read tunables from the environment. Never panics: an unparseable
    /// value falls back to the default and logs a warning, matching the
    /// teacher's tolerance of bad `BRRTR_STACK_SIZE` values.
    pub fn from_env() -> Self {
        let mut config = RouterConfig::default();

        if let Ok(raw) = env::var(STRICT_QUERY_VAR) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => config.strict_query_parsing = true,
                "false" | "0" | "no" => config.strict_query_parsing = false,
                _ => warn!(var = STRICT_QUERY_VAR, value = %raw, "unparseable bool, using default"),
            }
        }

        if let Ok(raw) = env::var(LOG_FORMAT_VAR) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "json" => config.log_format = LogFormat::Json,
                "pretty" => config.log_format = LogFormat::Pretty,
                _ => warn!(var = LOG_FORMAT_VAR, value = %raw, "unrecognised log format, using default"),
            }
        }

        config
    }
}
