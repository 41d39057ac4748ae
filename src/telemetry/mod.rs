//! Tracing setup helpers.
//!
//! The engine logs through [`tracing`]: registration and wiring at
//! `debug`, propagation internals at `trace`. Embedders that already run
//! a subscriber need nothing from here; binaries and tests can call
//! [`init`] for a reasonable default.

use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "error,floweave=info";

/// Install a global subscriber honoring `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`].
///
/// Calling this twice (or alongside another global subscriber) is a
/// no-op rather than a panic, so tests can call it freely.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a global subscriber with an explicit fallback filter.
pub fn init_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init();
}
