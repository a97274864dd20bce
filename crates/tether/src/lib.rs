//! # Tether
//!
//! Route handlers that return values instead of writing responses.
//!
//! ## Overview
//!
//! A Tether handler is a plain async function. It may return data, a future,
//! a stream, a mapping whose fields are still pending, an explicit response,
//! a domain error, or the pass-to-next sentinel. The adapter resolves the
//! value, classifies it, and writes exactly one response (or hands the
//! request on) exactly once, even when the client disconnects midway.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────────────────┐     ┌──────────────┐
//! │ NativeRouter │────▶│ adapter: select!(closed, ..) │────▶│ ResponseSink │
//! │ (Dispatcher) │◀────│ resolve ▶ classify ▶ emit    │     └──────────────┘
//! └──────────────┘Flow └──────────────────────────────┘
//! ```
//!
//! - **core**: reply model, resolution, classification, emission
//! - **framework**: handlers, extractors, error pipeline, adapter, router
//! - **runtime**: configuration and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether::prelude::*;
//!
//! async fn user(params: Params) -> Result<Json<User>, DomainError> {
//!     find(params.get("id")).await.map(Json).ok_or_else(|| DomainError::not_found("no such user"))
//! }
//!
//! let config = tether::runtime::config::load_config()?;
//! tether::runtime::init_from_config(&config.logging);
//!
//! let mut router = tether::runtime::build_router(&config.router);
//! router.get("/users/:id", user);
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use tether_core as core;
pub use tether_framework as framework;
pub use tether_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Result model
    pub use tether_core::{DomainError, Json, Next, Reply, Respond};

    // Request/response types
    pub use tether_core::{
        BufferedResponse, Exchange, Flow, Method, Request, ResponseSink, StatusCode,
    };

    // Registration
    pub use tether_framework::{Endpoint, Router};

    // Extractors
    pub use tether_framework::extractor::{FromExchange, JsonBody, Params, ResolvedParam};
}
