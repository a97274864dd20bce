//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, RouterConfig, TetherConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TetherConfig) -> ConfigResult<()> {
    validate_router_config(&config.router)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_router_config(router: &RouterConfig) -> ConfigResult<()> {
    // A null fallback would turn every unformatted failure into an empty 500.
    if router.fallback.is_null() {
        return Err(ConfigError::missing_field("router.fallback"));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(path) = logging.file_path.as_ref().filter(|p| p.file_name().is_none()) {
        return Err(ConfigError::validation(format!(
            "Log file path must name a file: {}",
            path.display()
        )));
    }

    for module in logging.filters.keys() {
        if module.is_empty() || module.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid logging filter target: {module:?}"
            )));
        }
    }

    Ok(())
}
