use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "VKOVERLAY_LOG";

/// Initialize structured logging with environment filter.
/// Set VKOVERLAY_LOG=debug (or trace, info, warn, error) for verbosity control;
/// otherwise `default_filter` applies.
///
/// Output goes to stderr so the host application's stdout stays untouched.
/// If the host already installed a global subscriber, it is left in place.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}
