//! Tracing subscriber setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const DEFAULT_FILTER: &str = "radolfzell_events=info";

/// Install a fmt subscriber filtered by `RUST_LOG`
///
/// Falls back to [`DEFAULT_FILTER`] when `RUST_LOG` is unset. Calling this
/// more than once is harmless; only the first call installs a subscriber.
pub fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into());

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
