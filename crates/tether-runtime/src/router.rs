//! Building routers from configuration.

use tracing::debug;

use tether_framework::{Dispatcher, NativeRouter, Router};

use crate::config::RouterConfig;

/// Builds a [`Router`] over a fresh [`Dispatcher`] with the configured
/// settings.
pub fn build_router(config: &RouterConfig) -> Router {
    build_router_with(Dispatcher::new(), config)
}

/// Builds a [`Router`] over an existing native router.
pub fn build_router_with<N: NativeRouter>(native: N, config: &RouterConfig) -> Router<N> {
    debug!(
        silence_warnings = config.silence_warnings,
        "Building router from configuration"
    );
    Router::with_settings(native, config.to_settings())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::{Body, BufferedResponse, BoxError, Method, Request, StatusCode};

    #[tokio::test]
    async fn test_configured_fallback_is_used() {
        let config = RouterConfig {
            silence_warnings: true,
            fallback: json!({ "error": "maintenance" }),
        };
        let mut router = build_router(&config);
        router.get("/", || async { Err::<String, BoxError>("boom".into()) });

        assert!(router.settings().snapshot().silence_warnings);

        let response = BufferedResponse::new();
        router.dispatch(Request::new(Method::GET, "/"), response.clone()).await;
        assert_eq!(response.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(response.body(), Some(Body::Json(json!({ "error": "maintenance" }))));
    }
}
