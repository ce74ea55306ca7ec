//! Logging setup for tools that embed the engine.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! left to the host. Build-tool adapters and small drivers that have no
//! subscriber of their own can call [`init_logger`].
//!
//! ```rust,no_run
//! weave::logger::init_logger(false, false);
//! tracing::info!("scanning");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a compact formatter.
///
/// `verbose` enables debug events for the weave crates, otherwise `RUST_LOG`
/// is honoured with an info-level fallback.
pub fn init_logger(verbose: bool, color: bool) {
    let filter = if verbose {
        EnvFilter::new("weave=debug,weave_config=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("weave=info,weave_config=info"))
    };

    init_logger_with_filter(filter, color);
}

/// Install a compact formatter with an explicit filter.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logger_with_filter(filter: EnvFilter, color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(color)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
