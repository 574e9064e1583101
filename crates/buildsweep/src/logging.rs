use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install the global tracing subscriber.
///
/// The filter comes from `BUILDSWEEP_LOG`, then `RUST_LOG`, then `info`.
/// `BUILDSWEEP_LOG_FORMAT=json` switches to JSON lines. Every event carries
/// its source file and line. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("BUILDSWEEP_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let json = std::env::var("BUILDSWEEP_LOG_FORMAT")
            .map(|v| matches!(v.to_lowercase().as_str(), "json" | "jsonl"))
            .unwrap_or(false);

        if json {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .init();
        }
    });
}
