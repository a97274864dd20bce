//! Configuration module for Tether routers.
//!
//! Layered figment-based loading of router and logging settings, plus
//! validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, RouterConfig, SpanEventConfig, TetherConfig,
};
pub use validation::validate_config;
