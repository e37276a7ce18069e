//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    error::{Error, Result},
};

/// Initialize JSON logging filtered by `service.log_level`
///
/// An unparseable level falls back to `info`. Fails if a global subscriber
/// is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    let log_level = &config.service.log_level;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialize tracing: {}", e)))?;

    tracing::info!(
        service = %config.service.name,
        environment = %config.service.environment,
        "Tracing initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let mut config = Config::default();
        config.service.log_level = "not a [valid filter".to_string();
        // the first call may race other tests for the global subscriber
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
