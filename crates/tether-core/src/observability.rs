//! Tracing subscriber setup.
//!
//! `TETHER_LOG` は `RUST_LOG` と同じ書式。未設定なら `default_directives` を使う。

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const LOG_ENV: &str = "TETHER_LOG";

pub const DEFAULT_DIRECTIVES: &str = "tether_core=info";

pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(
    default_directives: &str,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_filter(env_filter(default_directives));
    let subscriber = tracing_subscriber::Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber)
}
