//! Subscriber setup for the `contention` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to whoever embeds it.

use tracing_subscriber::EnvFilter;

/// Install a compact stderr subscriber filtered by `RUST_LOG` (default `info`).
///
/// Logs go to stderr so stdout stays free for the JSON report. Calling this
/// twice is harmless; the second call keeps the first subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
