//! Tracing setup for the Casegate binaries.
//!
//! Casegate logs are structured events carrying a stable `event` field
//! (`revision.*`, `decision.*`, `gate.*`, `waiver.*` — see [`crate::obs`]),
//! so a pipeline can filter on `event` rather than parsing message text.
//! [`init_tracing`] wires up the subscriber those events flow through.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise everything at `level`
/// and above is emitted. With `json` the output is newline-delimited JSON,
/// one object per event, for log aggregation.
///
/// Only the first call per process takes effect; later calls are no-ops,
/// so tests and embedding binaries can both call this unconditionally.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let format = fmt::layer().with_target(false);
    let format = if json {
        format.json().boxed()
    } else {
        format.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_a_noop() {
        init_tracing(false, Level::WARN);
        // The subscriber is already set; this must not panic.
        init_tracing(true, Level::DEBUG);
    }
}
