use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "project_log=info,plog=info,tower_http=info";

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. Output goes to stderr so
/// command output on stdout stays machine-readable. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
