use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout carries only the command report.
/// `REPOSTATS_LOG` takes an `EnvFilter` directive and wins over `--verbose`.
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("REPOSTATS_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
