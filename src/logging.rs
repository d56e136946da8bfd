//! Tracing setup for imagelens.
//!
//! The library itself only emits `tracing` events; binaries and tests that
//! want to see them install a subscriber through one of these helpers.

use std::sync::Once;

use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize the global tracing subscriber.
///
/// Honours `RUST_LOG`, defaulting to `info`. Subsequent calls are ignored.
pub fn init_tracing() {
    init_tracing_with("info");
}

/// Initialize the global subscriber with a fallback filter directive used
/// when `RUST_LOG` is unset (for example `"imagelens=trace"`).
pub fn init_tracing_with(default_directive: &str) {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        // A subscriber installed elsewhere wins; ours is simply not used.
        if tracing_subscriber::registry()
            .with(env_filter(default_directive))
            .with(fmt_layer)
            .try_init()
            .is_ok()
        {
            info!("imagelens tracing initialized");
        }
    });
}

/// Initialize tracing with JSON output for structured logging.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true);

        if tracing_subscriber::registry()
            .with(env_filter("info"))
            .with(fmt_layer)
            .try_init()
            .is_ok()
        {
            info!("imagelens tracing initialized (JSON mode)");
        }
    });
}

/// Span covering one parse of an image.
#[macro_export]
macro_rules! image_span {
    ($format:expr, $base:expr) => {
        tracing::debug_span!("parse_image", format = $format, base = format_args!("{:#x}", $base))
    };
}
