use tracing_subscriber::EnvFilter;

/// Installs the process-wide subscriber.
///
/// Logs go to stderr; stdout carries the RPC protocol.
pub fn init(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    tracing::info!(service = service_name, "logging initialized");
}
