//! Diagnostics go to stderr so stdout stays reserved for the outcome token.
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at info, or debug with
/// `--verbose`.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let default_directive = if verbose {
        "vprovision=debug,warn"
    } else {
        "vprovision=info,warn"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .try_init()
        .map_err(|err| anyhow!("initialize logging: {err}"))
}
