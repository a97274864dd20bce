//! Handler system for Tether.
//!
//! Handlers are plain async functions. Their parameters are extracted from
//! the [`Exchange`] through [`FromExchange`], and their return value only has
//! to implement [`IntoReply`]: data, `Option`, `Result`, an explicit
//! [`Respond`](tether_core::Respond), the [`Next`](tether_core::Next)
//! sentinel, or a deferred [`Reply`].
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_core::{DomainError, Json, Reply};
//! use tether_framework::extractor::Params;
//!
//! // Returns a plain payload: 200 + JSON body.
//! async fn health() -> serde_json::Value {
//!     serde_json::json!({ "ok": true })
//! }
//!
//! // Raises a domain error: 404 + its payload.
//! async fn user(params: Params) -> Result<Json<User>, DomainError> {
//!     find(params.get("id")).ok_or_else(|| DomainError::not_found("no such user"))
//! }
//!
//! // Returns a mapping whose fields resolve concurrently.
//! async fn dashboard() -> Reply {
//!     Reply::map([
//!         ("user", Reply::deferred(load_user())),
//!         ("feed", Reply::stream(feed_updates())),
//!     ])
//! }
//! ```

use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::extractor::FromExchange;
use tether_core::{Exchange, Failure, IntoReply, Reply};

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for value-returning route handlers.
///
/// # Blanket Implementation
///
/// Implemented for async functions that:
/// - take 0-12 parameters implementing [`FromExchange`]
/// - return a type implementing [`IntoReply`]
///
/// Calling a handler only produces its reply. Resolving, classifying and
/// writing that reply is the adapter's job.
#[async_trait]
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Extracts the parameters and runs the handler.
    async fn call(self, exchange: Exchange) -> Result<Reply, Failure>;
}

/// Macro to generate Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        #[async_trait]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoReply + 'static,
            $( $ty: FromExchange + Send + 'static, )*
        {
            async fn call(self, exchange: Exchange) -> Result<Reply, Failure> {
                $(
                    let $ty = $ty::from_exchange(&exchange)?;
                )*

                (self)($($ty,)*).await.into_reply()
            }
        }
    };
}

// Generate implementations for 0-12 parameters
impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);

// ============================================================================
// ParamHandler
// ============================================================================

/// A resolver for one named path parameter.
///
/// Receives the exchange and the raw captured value. Whatever payload it
/// returns is recorded on the request (see
/// [`Request::resolved`](tether_core::Request::resolved)); an explicit
/// response or domain error ends the chain instead.
///
/// ```rust,ignore
/// router.param("id", |_ex: Exchange, id: String| async move {
///     users.find(&id).await.ok_or_else(|| DomainError::not_found("unknown user"))
/// });
/// ```
pub trait ParamHandler: Clone + Send + Sync + 'static {
    /// Runs the resolver for the captured `value`.
    fn resolve(self, exchange: Exchange, value: String) -> BoxFuture<'static, Result<Reply, Failure>>;
}

impl<F, Fut, Res> ParamHandler for F
where
    F: FnOnce(Exchange, String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoReply + 'static,
{
    fn resolve(self, exchange: Exchange, value: String) -> BoxFuture<'static, Result<Reply, Failure>> {
        (self)(exchange, value).map(IntoReply::into_reply).boxed()
    }
}
