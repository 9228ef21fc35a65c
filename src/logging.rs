use tracing_subscriber::EnvFilter;

/// Log filter for the crate: `info`, or `debug` when verbose.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "dentalsim=debug" } else { "dentalsim=info" }
}

/// Install the stderr subscriber. Stdout is reserved for the result tables.
///
/// A second call is a no-op.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(default_filter(verbose)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn log_stage_event(stage: &str, event: &str, message: &str) {
    tracing::info!(stage, event, "{message}");
}
