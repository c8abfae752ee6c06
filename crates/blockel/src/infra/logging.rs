//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Build the filter from `RUST_LOG` when set, else from `fallback` (the config's `log.filter`).
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|err| {
            eprintln!("invalid log filter {fallback:?}: {err}; using \"info\"");
            EnvFilter::new("info")
        })
}

/// Install the global fmt subscriber. Later calls are no-ops.
pub fn init(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(fallback))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
