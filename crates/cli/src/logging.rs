use std::sync::OnceLock;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// Filter directive for the given `-v` count, falling back to the configured level
pub fn level_for(verbosity: u8, configured: &str) -> String {
    match verbosity {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `default_level`.
pub fn initialize_logging(default_level: &str) {
    if INIT_GUARD.set(()).is_err() {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let init_res = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
    let _ = init_res; // ignore AlreadyInit errors silently
}
