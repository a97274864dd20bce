//! The registration surface: value-returning handlers on top of a native
//! router.
//!
//! [`Router`] wraps every handler it receives in the adapter before passing
//! it to the [`NativeRouter`]. One [`SharedSettings`] instance is shared by
//! the router and all of its wrapped handlers, so formatter and warning
//! setters apply to routes registered before and after them.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_framework::{Router, extractor::Params};
//! use tether_core::{DomainError, Respond, StatusCode};
//!
//! let mut router = Router::new();
//!
//! router
//!     .get("/health", || async { "ok" })
//!     .post("/users", |JsonBody(user): JsonBody<NewUser>| async move {
//!         Respond::new(StatusCode::CREATED, Json(store(user).await?))
//!     })
//!     .param("id", |_ex: Exchange, id: String| async move {
//!         load_user(&id).await.ok_or_else(|| DomainError::not_found("unknown user"))
//!     });
//!
//! router.set_error_formatter(|failure, _ex| Ok(Reply::value(json!({ "error": failure.to_string() }))));
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tower::service_fn;
use tower::util::BoxCloneSyncService;

use crate::adapter::{Convention, HandlerService, ParamService};
use crate::dispatcher::{Dispatcher, NativeHandler, NativeRouter};
use crate::handler::{Handler, ParamHandler};
use crate::settings::{RouterSettings, SharedSettings};
use tether_core::{
    BoxError, Exchange, Failure, Flow, InternalWarning, Method, Reply, Request, ResponseHandle, ResponseSink,
};

/// The methods that get a dedicated registration function.
pub const METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
    Method::CONNECT,
    Method::TRACE,
];

/// Invokes `$callback!` with the `fn name => Method` table behind [`METHODS`].
macro_rules! for_each_method {
    ($callback:ident) => {
        $callback! {
            get => GET,
            post => POST,
            put => PUT,
            delete => DELETE,
            patch => PATCH,
            head => HEAD,
            options => OPTIONS,
            connect => CONNECT,
            trace => TRACE,
        }
    };
}

// ============================================================================
// Endpoint
// ============================================================================

type Build = Box<dyn FnOnce(&SharedSettings) -> NativeHandler + Send>;

/// One handler waiting to be registered, tagged with its calling convention.
///
/// The native service is built at registration, bound to the router's
/// settings.
pub struct Endpoint(Build);

impl Endpoint {
    /// An auto-responding handler.
    pub fn respond<H, T>(handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        Self::wrapped(handler, Convention::Respond)
    }

    /// A pass-through handler: only explicit responses and errors are
    /// written.
    pub fn pass_through<H, T>(handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        Self::wrapped(handler, Convention::PassThrough)
    }

    /// A native handler, registered without the adapter.
    pub fn legacy<F, Fut>(handler: F) -> Self
    where
        F: Fn(Exchange) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Flow> + Send + 'static,
    {
        Self(Box::new(move |_: &SharedSettings| {
            BoxCloneSyncService::new(service_fn(move |exchange: Exchange| {
                handler(exchange).map(Ok::<_, Infallible>)
            }))
        }))
    }

    fn wrapped<H, T>(handler: H, convention: Convention) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        Self(Box::new(move |settings: &SharedSettings| {
            BoxCloneSyncService::new(HandlerService::new(handler, settings.clone(), convention))
        }))
    }

    fn build(self, settings: &SharedSettings) -> NativeHandler {
        (self.0)(settings)
    }
}

// ============================================================================
// Router
// ============================================================================

macro_rules! router_method_fns {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Appends an auto-responding `", stringify!($method), "` handler for `path`.")]
            ///
            /// Call it again to append more handlers, or use [`Router::on`] to
            /// register several [`Endpoint`]s at once.
            pub fn $name<H, T>(&mut self, path: &str, handler: H) -> &mut Self
            where
                H: Handler<T>,
                T: 'static,
            {
                self.on(Some(Method::$method), path, [Endpoint::respond(handler)])
            }
        )*
    };
}

/// Registers value-returning handlers on a native router.
pub struct Router<N = Dispatcher> {
    native: N,
    settings: SharedSettings,
}

impl Router<Dispatcher> {
    /// Creates a router over a fresh [`Dispatcher`].
    pub fn new() -> Self {
        Self::wrap(Dispatcher::new())
    }

    /// Dispatches `request`, writing to `sink`.
    pub async fn dispatch(&self, request: Request, sink: impl ResponseSink + 'static) -> Flow {
        self.native
            .dispatch(Arc::new(request), ResponseHandle::new(sink))
            .await
    }
}

impl Default for Router<Dispatcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NativeRouter> Router<N> {
    /// Wraps an existing native router.
    pub fn wrap(native: N) -> Self {
        Self::with_settings(native, RouterSettings::default())
    }

    pub fn with_settings(native: N, settings: RouterSettings) -> Self {
        Self {
            native,
            settings: SharedSettings::new(settings),
        }
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn into_native(self) -> N {
        self.native
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    for_each_method!(router_method_fns);

    /// Appends an auto-responding handler for every method.
    pub fn all<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.on(None, path, [Endpoint::respond(handler)])
    }

    /// Appends `endpoints`, in order, for `method` (every method when `None`).
    ///
    /// This is the multi-handler form of the per-method functions:
    ///
    /// ```rust,ignore
    /// router.on(Some(Method::GET), "/report", [
    ///     Endpoint::pass_through(check_quota),
    ///     Endpoint::respond(build_report),
    /// ]);
    /// ```
    pub fn on(
        &mut self,
        method: Option<Method>,
        path: &str,
        endpoints: impl IntoIterator<Item = Endpoint>,
    ) -> &mut Self {
        for endpoint in endpoints {
            let handler = endpoint.build(&self.settings);
            self.native.add_route(method.clone(), path, handler);
        }
        self
    }

    /// Appends a pass-through handler.
    pub fn middleware<H, T>(&mut self, method: Option<Method>, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.on(method, path, [Endpoint::pass_through(handler)])
    }

    /// Appends a native handler, unwrapped.
    pub fn legacy<F, Fut>(&mut self, method: Option<Method>, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Exchange) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Flow> + Send + 'static,
    {
        self.on(method, path, [Endpoint::legacy(handler)])
    }

    /// Registers a resolver for the path parameter `name`.
    pub fn param<P: ParamHandler>(&mut self, name: &str, resolver: P) -> &mut Self {
        let service = ParamService::new(name, resolver, self.settings.clone());
        self.native.add_param(name, BoxCloneSyncService::new(service));
        self
    }

    /// Scopes registration to one path.
    pub fn route<'a>(&'a mut self, path: &'a str) -> Route<'a, N> {
        Route { router: self, path }
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub fn set_error_formatter<F>(&mut self, formatter: F) -> &mut Self
    where
        F: Fn(&Failure, &Exchange) -> Result<Reply, BoxError> + Send + Sync + 'static,
    {
        self.settings.update(|s| s.error_formatter = Some(Arc::new(formatter)));
        self
    }

    pub fn set_success_formatter<F>(&mut self, formatter: F) -> &mut Self
    where
        F: Fn(Value, &Exchange) -> Result<Reply, BoxError> + Send + Sync + 'static,
    {
        self.settings.update(|s| s.success_formatter = Some(Arc::new(formatter)));
        self
    }

    /// Stops logging internal warnings. They are still published on the
    /// response's diagnostic channel.
    pub fn silence_warnings(&mut self, silenced: bool) -> &mut Self {
        self.settings.update(|s| s.silence_warnings = silenced);
        self
    }

    /// Replaces the payload sent with unformatted `500` responses.
    pub fn set_fallback_payload(&mut self, payload: impl Into<Value>) -> &mut Self {
        let payload = payload.into();
        self.settings.update(|s| s.fallback = payload);
        self
    }

    pub fn set_warning_sink<F>(&mut self, sink: F) -> &mut Self
    where
        F: Fn(&InternalWarning) + Send + Sync + 'static,
    {
        self.settings.update(|s| s.warning_sink = Some(Arc::new(sink)));
        self
    }
}

impl<N> std::fmt::Debug for Router<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Route
// ============================================================================

macro_rules! route_method_fns {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Appends an auto-responding `", stringify!($method), "` handler.")]
            pub fn $name<H, T>(self, handler: H) -> Self
            where
                H: Handler<T>,
                T: 'static,
            {
                self.router.on(Some(Method::$method), self.path, [Endpoint::respond(handler)]);
                self
            }
        )*
    };
}

/// Registration scoped to one path, returned by [`Router::route`].
///
/// ```rust,ignore
/// router
///     .route("/users/:id")
///     .get(show_user)
///     .put(update_user)
///     .delete(remove_user);
/// ```
pub struct Route<'a, N> {
    router: &'a mut Router<N>,
    path: &'a str,
}

impl<N: NativeRouter> Route<'_, N> {
    for_each_method!(route_method_fns);

    pub fn all<H, T>(self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.router.on(None, self.path, [Endpoint::respond(handler)]);
        self
    }

    pub fn middleware<H, T>(self, method: Option<Method>, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.router.middleware(method, self.path, handler);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::extractor::{Params, ResolvedParam};
    use futures::stream;
    use serde_json::json;
    use tether_core::{Body, BufferedResponse, DomainError, Next, Respond, StatusCode};
    use tokio_util::sync::CancellationToken;

    async fn get(router: &Router, path: &str) -> (Flow, BufferedResponse) {
        let response = BufferedResponse::new();
        let flow = router.dispatch(Request::new(Method::GET, path), response.clone()).await;
        (flow, response)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        (count, move || counter.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_literal_payload() {
        let mut router = Router::new();
        router.get("/", || async { json!({ "hello": "world" }) });

        let (flow, response) = get(&router, "/").await;
        assert_eq!(flow, Flow::Halt);
        assert_eq!(response.status(), Some(StatusCode::OK));
        assert_eq!(response.body(), Some(Body::Json(json!({ "hello": "world" }))));
    }

    #[tokio::test]
    async fn test_nested_deferred_fields() {
        let mut router = Router::new();
        router.get("/", || async {
            Reply::map([
                ("a", Reply::deferred(async { Reply::deferred(async { 1 }) })),
                ("b", Reply::stream(stream::iter(["first", "second"]))),
                (
                    "c",
                    Reply::map([("d", Reply::map([("e", Reply::deferred(async { true }))]))]),
                ),
                ("list", Reply::value(json!([1, 2, 3]))),
            ])
        });

        let (_, response) = get(&router, "/").await;
        assert_eq!(
            response.body(),
            Some(Body::Json(json!({
                "a": 1,
                "b": "first",
                "c": { "d": { "e": true } },
                "list": [1, 2, 3],
            })))
        );
    }

    #[tokio::test]
    async fn test_raised_domain_error_without_formatter() {
        let mut router = Router::new();
        router.get("/", || async {
            Err::<Value, _>(DomainError::new(StatusCode::GONE, json!({ "moved": "elsewhere" })))
        });

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.status(), Some(StatusCode::GONE));
        assert_eq!(response.body(), Some(Body::Json(json!({ "moved": "elsewhere" }))));
    }

    #[tokio::test]
    async fn test_formatter_for_unexpected_error() {
        let mut router = Router::new();
        router
            .get("/", || async { Err::<Value, BoxError>("database offline".into()) })
            .set_error_formatter(|_failure, _ex| Ok(Reply::value(json!({ "formatted": true }))));

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(response.body(), Some(Body::Json(json!({ "formatted": true }))));
    }

    #[tokio::test]
    async fn test_formatter_raising_domain_error() {
        let mut router = Router::new();
        router
            .get("/", || async { Err::<Value, BoxError>("boom".into()) })
            .set_error_formatter(|_failure, _ex| {
                Err(DomainError::new(StatusCode::BAD_GATEWAY, json!({ "upstream": "down" })).into())
            });

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(response.body(), Some(Body::Json(json!({ "upstream": "down" }))));
    }

    #[tokio::test]
    async fn test_formatter_failing_uses_fallback() {
        let mut router = Router::new();
        router
            .get("/", || async { Err::<Value, BoxError>("secret detail".into()) })
            .set_error_formatter(|_failure, _ex| Err("formatter bug".into()));

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(
            response.body(),
            Some(Body::Json(json!({ "error": "Internal server error" })))
        );
    }

    #[tokio::test]
    async fn test_custom_fallback_payload() {
        let mut router = Router::new();
        router
            .get("/", || async { Err::<Value, BoxError>("boom".into()) })
            .set_fallback_payload(json!({ "error": "try again" }));

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.body(), Some(Body::Json(json!({ "error": "try again" }))));
    }

    #[tokio::test]
    async fn test_sentinel_runs_next_handler() {
        let mut router = Router::new();
        router
            .get("/", || async { Next })
            .get("/", || async { "second" });

        let (flow, response) = get(&router, "/").await;
        assert_eq!(flow, Flow::Halt);
        assert_eq!(response.body(), Some(Body::Raw("second".into())));
        assert_eq!(response.writes(), 1);
    }

    #[tokio::test]
    async fn test_on_registers_handlers_in_order() {
        let mut router = Router::new();
        router.on(
            Some(Method::GET),
            "/",
            [
                Endpoint::pass_through(|| async {}),
                Endpoint::respond(|| async { Next }),
                Endpoint::respond(|| async { "third" }),
            ],
        );

        let (flow, response) = get(&router, "/").await;
        assert_eq!(flow, Flow::Halt);
        assert_eq!(response.body(), Some(Body::Raw("third".into())));
        assert_eq!(router.native().route_count(), 3);
    }

    #[tokio::test]
    async fn test_status_override() {
        let mut router = Router::new();
        router.get("/", || async {
            Respond::new(StatusCode::IM_A_TEAPOT, json!({ "customResponse": "test" }))
        });

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.status(), Some(StatusCode::IM_A_TEAPOT));
        assert_eq!(response.body(), Some(Body::Json(json!({ "customResponse": "test" }))));
    }

    #[tokio::test]
    async fn test_empty_mapping_responds_immediately() {
        let mut router = Router::new();
        router.get("/", || async { Reply::map(Vec::<(String, Reply)>::new()) });

        let (_, response) = tokio::time::timeout(Duration::from_secs(1), get(&router, "/"))
            .await
            .unwrap();
        assert_eq!(response.status(), Some(StatusCode::OK));
        assert_eq!(response.body(), Some(Body::Json(json!({}))));
    }

    #[tokio::test]
    async fn test_absent_neither_writes_nor_proceeds() {
        let (count, calls) = counter();
        let mut router = Router::new();
        router.get("/", || async {}).get("/", move || {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                "unreachable"
            }
        });

        let (flow, response) = tokio::time::timeout(Duration::from_secs(1), get(&router, "/"))
            .await
            .unwrap();
        assert_eq!(flow, Flow::Halt);
        assert!(!response.is_written());
        assert_eq!(calls(), 0);
    }

    #[tokio::test]
    async fn test_headers_already_sent_is_a_warning() {
        let mut router = Router::new();
        router
            .legacy(Some(Method::GET), "/", |ex: Exchange| async move {
                ex.response().with(|sink| {
                    sink.set_status(StatusCode::ACCEPTED);
                    sink.write_raw("legacy");
                });
                Flow::Next
            })
            .get("/", || async { json!({ "late": true }) });

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.writes(), 1);
        assert_eq!(response.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(response.body(), Some(Body::Raw("legacy".into())));
        assert_eq!(response.warnings(), vec![InternalWarning::headers_sent()]);
    }

    #[tokio::test]
    async fn test_silenced_warnings_still_reach_the_response() {
        let (count, logged) = counter();
        let mut router = Router::new();
        router
            .get("/", || async { Reply::map([("inner", Reply::from(Respond::empty(StatusCode::OK)))]) })
            .set_warning_sink(move |_w| {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .silence_warnings(true);

        let (_, response) = get(&router, "/").await;
        assert!(!response.is_written());
        assert_eq!(response.warnings().len(), 1);
        assert_eq!(logged(), 0);
    }

    #[tokio::test]
    async fn test_warning_sink_receives_warnings() {
        let (count, logged) = counter();
        let mut router = Router::new();
        router
            .get("/", || async { Reply::map([("inner", Reply::from(Next))]) })
            .set_warning_sink(move |_w| {
                count.fetch_add(1, Ordering::SeqCst);
            });

        get(&router, "/").await;
        assert_eq!(logged(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_request_is_left_alone() {
        let token = CancellationToken::new();
        let mut router = Router::new();
        router.get("/", || async {
            Reply::stream(stream::pending::<Value>())
        });

        let response = BufferedResponse::new();
        let request = Request::new(Method::GET, "/").with_cancellation(token.clone());
        let dispatch = router.dispatch(request, response.clone());
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        };

        let (flow, ()) = tokio::join!(dispatch, cancel);
        assert_eq!(flow, Flow::Halt);
        assert!(!response.is_written());
        assert!(response.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_param_handler_resolves_value() {
        let mut router = Router::new();
        router
            .param("id", |_ex: Exchange, id: String| async move { json!({ "id": id, "name": "ada" }) })
            .get("/users/:id", |ResolvedParam(user): ResolvedParam| async move { user });

        let (_, response) = get(&router, "/users/1").await;
        assert_eq!(response.body(), Some(Body::Json(json!({ "id": "1", "name": "ada" }))));
    }

    #[tokio::test]
    async fn test_param_handler_can_halt_with_domain_error() {
        let (count, calls) = counter();
        let mut router = Router::new();
        router
            .param("id", |_ex: Exchange, _id: String| async move {
                Err::<Value, _>(DomainError::not_found(json!({ "error": "no such user" })))
            })
            .get("/users/:id", move || {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    "unreachable"
                }
            });

        let (flow, response) = get(&router, "/users/9").await;
        assert_eq!(flow, Flow::Halt);
        assert_eq!(response.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(calls(), 0);
    }

    #[tokio::test]
    async fn test_middleware_guards_route() {
        let mut router = Router::new();
        router
            .middleware(None, "/admin", |req: Arc<Request>| async move {
                match req.headers().get("x-admin") {
                    Some(_) => None,
                    None => Some(Respond::new(StatusCode::FORBIDDEN, json!({ "error": "admins only" }))),
                }
            })
            .get("/admin", || async { "welcome" });

        let (_, denied) = get(&router, "/admin").await;
        assert_eq!(denied.status(), Some(StatusCode::FORBIDDEN));

        let allowed = BufferedResponse::new();
        let request = Request::new(Method::GET, "/admin").with_header(
            http::HeaderName::from_static("x-admin"),
            http::HeaderValue::from_static("1"),
        );
        router.dispatch(request, allowed.clone()).await;
        assert_eq!(allowed.body(), Some(Body::Raw("welcome".into())));
    }

    #[tokio::test]
    async fn test_middleware_without_body_lets_chain_continue() {
        let (count, calls) = counter();
        let mut router = Router::new();
        router
            .middleware(None, "/audit", || async { Respond::empty(StatusCode::NO_CONTENT) })
            .get("/audit", move || {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    "recorded"
                }
            });

        let (flow, response) = get(&router, "/audit").await;
        assert_eq!(flow, Flow::Halt);
        assert_eq!(calls(), 1);
        assert_eq!(response.body(), Some(Body::Raw("recorded".into())));
        assert!(response.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_route_scoped_registration() {
        let mut router = Router::new();
        router
            .route("/items/:id")
            .get(|params: Params| async move { json!({ "get": params.get("id") }) })
            .delete(|| async { Respond::empty(StatusCode::NO_CONTENT) });

        let (_, got) = get(&router, "/items/4").await;
        assert_eq!(got.body(), Some(Body::Json(json!({ "get": "4" }))));

        let deleted = BufferedResponse::new();
        router
            .dispatch(Request::new(Method::DELETE, "/items/4"), deleted.clone())
            .await;
        assert_eq!(deleted.status(), None);
        assert!(!deleted.is_written());
        assert_eq!(router.native().route_count(), 2);
    }

    #[tokio::test]
    async fn test_success_formatter_envelope() {
        let mut router = Router::new();
        router
            .get("/", || async { json!([1, 2]) })
            .set_success_formatter(|payload, _ex| Ok(Reply::value(json!({ "data": payload }))));

        let (_, response) = get(&router, "/").await;
        assert_eq!(response.body(), Some(Body::Json(json!({ "data": [1, 2] }))));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_bad_request() {
        let mut router = Router::new();
        router.post("/", |crate::extractor::JsonBody(v): crate::extractor::JsonBody<Vec<u8>>| async move {
            v.len() as u64
        });

        let response = BufferedResponse::new();
        router.dispatch(Request::new(Method::POST, "/"), response.clone()).await;
        assert_eq!(response.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_method_table() {
        assert_eq!(METHODS.len(), 9);
        assert!(METHODS.contains(&Method::PATCH));
    }
}
