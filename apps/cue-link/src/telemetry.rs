use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Calling it again once a subscriber is installed is not an error.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    match fmt().with_env_filter(filter).with_target(false).try_init() {
        Ok(()) => Ok(()),
        Err(err)
            if err
                .to_string()
                .contains("attempted to set a global default subscriber more than once") =>
        {
            Ok(())
        }
        Err(err) => Err(anyhow!(err)),
    }
}
