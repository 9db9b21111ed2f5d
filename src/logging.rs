//! tracing subscriber setup for binaries and long-running hosts.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `rivalry=info`).
///
/// Does nothing if a global subscriber is already installed.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rivalry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
