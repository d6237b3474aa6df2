use crate::config::LoggingConfig;
use loom_core::{LoomError, LoomResult};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the configured level. Fails if a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> LoomResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoomError::Config(format!("invalid log level '{}': {e}", config.level)))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| LoomError::Config(format!("tracing subscriber already set: {e}")))
}
