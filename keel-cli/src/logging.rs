//! Logging setup for the `keel` binary.
//!
//! Diagnostics go to stderr through `tracing-subscriber`. The filter comes
//! from, in order of precedence:
//!
//! - `-v` / `-vv` on the command line (`info` / `debug` for Keel crates)
//! - the `KEEL_LOG` environment variable (any `EnvFilter` directive)
//! - `[debug] log_level` in `keel.toml`

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "KEEL_LOG";

static INIT: Once = Once::new();

/// Filter directive for a verbosity count and configured default level.
pub fn filter_directive(verbose: u8, configured: &str) -> String {
    let level = match verbose {
        0 => return std::env::var(LOG_ENV).unwrap_or_else(|_| configured.to_string()),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!(
        "keel={level},keel_schema={level},keel_migrate={level},keel_cli={level}",
        level = level
    )
}

/// Initialize logging. Subsequent calls are no-ops.
pub fn init(verbose: u8, configured: &str) {
    INIT.call_once(|| {
        let directive = filter_directive(verbose, configured);
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();

        tracing::debug!(filter = %directive, "logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_overrides_configuration() {
        let directive = filter_directive(2, "warn");
        assert!(directive.contains("keel_migrate=debug"));
        assert!(directive.contains("keel_schema=debug"));
    }

    #[test]
    fn test_trace_caps_verbosity() {
        assert!(filter_directive(5, "warn").contains("keel_cli=trace"));
    }
}
