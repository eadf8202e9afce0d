use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize diagnostic logging on stderr.
///
/// The level applies to this crate only; `RUST_LOG` overrides it entirely.
/// Stdout stays reserved for the printed report.
pub fn init_logging(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_filter = format!("atmos_conductance={level},warn");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init()?;

    tracing::debug!(level, "logging initialized");
    Ok(())
}
