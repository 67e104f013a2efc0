//! Tracing hooks for the queue internals.
//!
//! Built with `--features tracing`, the crate logs its producer/consumer
//! protocol through the `tracing` crate. Without the feature every macro
//! below expands to nothing.

/// Install a global `tracing` subscriber for queue diagnostics.
///
/// Filtering comes from `RUST_LOG` when set, otherwise everything from this
/// crate at `trace` level. Safe to call more than once: later calls leave the
/// already-installed subscriber in place. A no-op without the `tracing`
/// feature.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sluice=trace"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! discard {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use discard as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as error;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as trace;
