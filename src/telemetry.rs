use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install JSON logging on stdout.
///
/// The level is read from `RUST_LOG` and defaults to `info`. Records emitted
/// through the `log` facade (actix-web's request logger) are forwarded too.
pub fn init_telemetry() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Telemetry already initialized");
    }
}
