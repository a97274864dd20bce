//! Tether Runtime - configuration and logging for Tether applications.
//!
//! This crate provides:
//! - Layered configuration loading with figment (`TetherConfig`, `ConfigLoader`)
//! - Configuration validation
//! - Logging setup on `tracing-subscriber` (`LoggingBuilder`, `SpanEvents`)
//! - Routers built from configuration (`build_router`)
//!
//! ```rust,ignore
//! use tether_runtime::{build_router, config::{load_config, validate_config}, logging};
//!
//! let config = load_config()?;
//! validate_config(&config)?;
//! logging::init_from_config(&config.logging);
//!
//! let mut router = build_router(&config.router);
//! router.get("/health", || async { "ok" });
//! ```

pub mod config;
pub mod logging;
pub mod router;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LoggingConfig, Profile, RouterConfig, TetherConfig,
    validate_config,
};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};
pub use router::{build_router, build_router_with};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros, for applications that do not depend on `tracing`
/// directly.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
