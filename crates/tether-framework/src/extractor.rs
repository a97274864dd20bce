//! Extractor system for Tether handlers.
//!
//! [`FromExchange`] defines how a handler parameter is pulled out of the
//! current [`Exchange`]. A failed extraction is raised into the pipeline as a
//! `400 Bad Request` domain error, so the client learns what was wrong with
//! its request.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_framework::extractor::{JsonBody, Params};
//!
//! #[derive(serde::Deserialize)]
//! struct NewUser { name: String }
//!
//! async fn create(params: Params, JsonBody(user): JsonBody<NewUser>) -> String {
//!     format!("{} in {}", user.name, params.get("team").unwrap_or("-"))
//! }
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use tether_core::{Exchange, ExtractError, Method, Request};

pub use tether_core::Params;

/// A type that can be extracted from an [`Exchange`].
pub trait FromExchange: Sized {
    /// Attempts to extract this type from the given exchange.
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError>;
}

impl FromExchange for Exchange {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        Ok(exchange.clone())
    }
}

impl FromExchange for Arc<Request> {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        Ok(Arc::clone(exchange.request()))
    }
}

impl FromExchange for Params {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        Ok(exchange.params().clone())
    }
}

impl FromExchange for Method {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        Ok(exchange.request().method().clone())
    }
}

/// The connection-lifecycle token, for handlers that run their own
/// cancellable work.
impl FromExchange for CancellationToken {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        Ok(exchange.request().closed().clone())
    }
}

/// Optional parameters never fail; a failed extraction becomes `None`.
impl<T: FromExchange> FromExchange for Option<T> {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        Ok(T::from_exchange(exchange).ok())
    }
}

/// The request body deserialized into `T`.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T: DeserializeOwned> FromExchange for JsonBody<T> {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        let body = exchange.request().body().ok_or(ExtractError::MissingBody)?;
        T::deserialize(body)
            .map(JsonBody)
            .map_err(|e| ExtractError::InvalidBody {
                expected: std::any::type_name::<T>(),
                reason: e.to_string(),
            })
    }
}

/// A value a parameter handler resolved for the current route.
///
/// As an extractor it yields the value of the first captured parameter, in
/// pattern order, that has one. On `/teams/:team/users/:user` with both
/// parameters resolved that is always `team`; use [`ResolvedParam::named`]
/// to pick another.
#[derive(Debug, Clone)]
pub struct ResolvedParam(pub serde_json::Value);

impl ResolvedParam {
    /// The value resolved for the parameter `name`, if the current route
    /// captures it and a parameter handler produced one.
    pub fn named(exchange: &Exchange, name: &str) -> Option<Self> {
        exchange.params().get(name)?;
        exchange.request().resolved(name).map(ResolvedParam)
    }
}

impl FromExchange for ResolvedParam {
    fn from_exchange(exchange: &Exchange) -> Result<Self, ExtractError> {
        exchange
            .params()
            .iter()
            .find_map(|(name, _)| exchange.request().resolved(name))
            .map(ResolvedParam)
            .ok_or_else(|| ExtractError::custom("no parameter handler resolved a value for this route"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tether_core::{BufferedResponse, ResponseHandle};

    fn exchange_with(request: Request) -> Exchange {
        Exchange::new(Arc::new(request), ResponseHandle::new(BufferedResponse::new()))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        user: String,
    }

    #[test]
    fn test_json_body_deserializes() {
        let exchange = exchange_with(Request::new(Method::POST, "/login").with_body(json!({ "user": "ada" })));
        let JsonBody(login) = JsonBody::<Login>::from_exchange(&exchange).unwrap();
        assert_eq!(login, Login { user: "ada".into() });
    }

    #[test]
    fn test_json_body_missing() {
        let exchange = exchange_with(Request::new(Method::POST, "/login"));
        assert!(matches!(
            JsonBody::<Login>::from_exchange(&exchange),
            Err(ExtractError::MissingBody)
        ));
    }

    #[test]
    fn test_json_body_invalid() {
        let exchange = exchange_with(Request::new(Method::POST, "/login").with_body(json!({ "nope": 1 })));
        assert!(matches!(
            JsonBody::<Login>::from_exchange(&exchange),
            Err(ExtractError::InvalidBody { .. })
        ));
    }

    #[test]
    fn test_optional_extractor_never_fails() {
        let exchange = exchange_with(Request::new(Method::GET, "/"));
        let body = Option::<JsonBody<Login>>::from_exchange(&exchange).unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn test_resolved_param_reads_request_state() {
        let exchange = exchange_with(Request::new(Method::GET, "/users/1"))
            .with_params([("id", "1")].into_iter().collect());
        exchange.request().set_resolved("id", json!({ "name": "ada" }));

        let ResolvedParam(user) = ResolvedParam::from_exchange(&exchange).unwrap();
        assert_eq!(user, json!({ "name": "ada" }));
    }

    #[test]
    fn test_resolved_param_follows_pattern_order() {
        let exchange = exchange_with(Request::new(Method::GET, "/teams/core/users/ada"))
            .with_params([("team", "core"), ("user", "ada")].into_iter().collect());
        exchange.request().set_resolved("user", json!("user ada"));
        exchange.request().set_resolved("team", json!("team core"));

        for _ in 0..16 {
            let ResolvedParam(first) = ResolvedParam::from_exchange(&exchange).unwrap();
            assert_eq!(first, json!("team core"));
        }

        let ResolvedParam(user) = ResolvedParam::named(&exchange, "user").unwrap();
        assert_eq!(user, json!("user ada"));
        assert!(ResolvedParam::named(&exchange, "org").is_none());
    }
}
