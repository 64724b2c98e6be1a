use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding an explicit filter, e.g. `OJET_LOG=ojet_tooling=trace`.
pub const LOG_ENV: &str = "OJET_LOG";

pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "ojet_tooling=debug,info" } else { "info" }
}

/// Installs the stderr subscriber. A second call is a no-op.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .compact(),
        )
        .try_init();
}
