//! Tracing (logging)

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &str = "pickup_explorer=debug,tower_http=debug";

/// Initialise tracing (logging)
///
/// Events are filtered by the `RUST_LOG` environment variable, or [DEFAULT_DIRECTIVES]. Thread
/// names are included since aggregations run on worker threads.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .init();
}
