//! Process-wide tracing setup.
//!
//! The coordinator and stores emit structured `tracing` events; this crate
//! installs the subscriber that renders them. Library crates never install
//! a subscriber themselves, so binaries and test harnesses call [`init`]
//! at startup.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber: JSON events with timestamps,
/// filtered by `RUST_LOG` when set, `info` otherwise.
///
/// Safe to call more than once; later calls are no-ops, so concurrent tests
/// can each request initialization without coordinating.
pub fn init() {
    init_with_default_filter("info");
}

/// Like [`init`], with an explicit fallback filter for when `RUST_LOG` is
/// unset. Test harnesses use this to keep retry/backoff noise out of test
/// output while still exercising the full logging path.
pub fn init_with_default_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(false)
        .try_init();
}
