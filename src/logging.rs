use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// The library itself never calls this; applications and tests opt in.
pub fn init_tracing() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call leaves the first subscriber in place.
    let _ = fmt::Subscriber::builder().with_env_filter(env).try_init();
}
