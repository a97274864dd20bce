//! Router-wide configuration read by every wrapped handler.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Value, json};

use tether_core::{BoxError, Exchange, Failure, InternalWarning, Reply};

/// Rewrites a successful payload before it is classified.
pub type SuccessFormatter = Arc<dyn Fn(Value, &Exchange) -> Result<Reply, BoxError> + Send + Sync>;

/// Turns a failure into a reply. Returning an absent reply falls through to
/// the default handling.
pub type ErrorFormatter = Arc<dyn Fn(&Failure, &Exchange) -> Result<Reply, BoxError> + Send + Sync>;

/// Receives internal warnings in place of the default `tracing::warn!`.
pub type WarningSink = Arc<dyn Fn(&InternalWarning) + Send + Sync>;

/// Payload sent with `500` when no formatter produced one.
pub fn default_fallback() -> Value {
    json!({ "error": "Internal server error" })
}

/// Configuration of one router.
#[derive(Clone)]
pub struct RouterSettings {
    pub success_formatter: Option<SuccessFormatter>,
    pub error_formatter: Option<ErrorFormatter>,
    pub silence_warnings: bool,
    pub fallback: Value,
    pub warning_sink: Option<WarningSink>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            success_formatter: None,
            error_formatter: None,
            silence_warnings: false,
            fallback: default_fallback(),
            warning_sink: None,
        }
    }
}

impl fmt::Debug for RouterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterSettings")
            .field("success_formatter", &self.success_formatter.is_some())
            .field("error_formatter", &self.error_formatter.is_some())
            .field("silence_warnings", &self.silence_warnings)
            .field("fallback", &self.fallback)
            .field("warning_sink", &self.warning_sink.is_some())
            .finish()
    }
}

/// Settings shared between a router and the handlers it wrapped.
///
/// Handlers take a [`snapshot`](Self::snapshot) when an invocation starts, so
/// a setter called mid-request never changes the rules of that request halfway.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<RouterSettings>>);

impl SharedSettings {
    pub fn new(settings: RouterSettings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub fn snapshot(&self) -> RouterSettings {
        self.0.read().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut RouterSettings)) {
        f(&mut self.0.write());
    }
}
