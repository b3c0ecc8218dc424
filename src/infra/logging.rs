//! Diagnostic logging setup
//!
//! Events go to stderr so stdout stays clean for diffs and JSON.
//! `RUST_LOG` wins over the defaults when set.

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing(
    verbose: bool,
    no_color: bool,
)
{
    let default = if verbose { "devpatch=debug,dpatch=debug,warn" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(verbose)
        .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_string()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
