use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the tracing subscriber for host applications and tools.
/// Honours RUST_LOG; defaults to "info" when it is not set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .try_init()
        .ok();
}
