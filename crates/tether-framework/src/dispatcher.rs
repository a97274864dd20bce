//! Native routing seam and the in-memory reference dispatcher.
//!
//! The adapter never matches paths itself. It hands finished tower services
//! to a [`NativeRouter`], which owns matching, ordering and chain control.
//! [`Dispatcher`] is a minimal implementation of that seam:
//!
//! 1. Route layers are checked in registration order
//! 2. Patterns are literal segments plus `:name` captures
//! 3. Before the first layer that captures a parameter runs, the parameter
//!    handlers registered for it run, once per request, in pattern order
//! 4. A layer returning [`Flow::Halt`] stops dispatch
//!
//! ```rust,ignore
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.add_route(Some(Method::GET), "/users/:id", service);
//! let flow = dispatcher.dispatch(Arc::new(request), ResponseHandle::new(sink)).await;
//! ```

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use tower::ServiceExt;
use tower::util::BoxCloneSyncService;
use tracing::{Instrument, Level, debug, span, trace};

use tether_core::{Exchange, Flow, Method, Params, Request, ResponseHandle};

/// A type-erased native handler: `Exchange` in, chain control out.
pub type NativeHandler = BoxCloneSyncService<Exchange, Flow, Infallible>;

/// A type-erased native parameter handler, called with the captured value.
pub type NativeParamHandler = BoxCloneSyncService<(Exchange, String), Flow, Infallible>;

/// The registration surface of the router being wrapped.
pub trait NativeRouter: Send + Sync {
    /// Appends `handler` to the chain for `method` (every method when `None`)
    /// and `path`.
    fn add_route(&mut self, method: Option<Method>, path: &str, handler: NativeHandler);

    /// Registers a handler for the path parameter `name`.
    fn add_param(&mut self, name: &str, handler: NativeParamHandler);
}

// ============================================================================
// Pattern
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// A parsed route pattern such as `/users/:id/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(path: &str) -> Self {
        let segments = split(path)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Capture(name.to_owned()),
                None => Segment::Literal(s.to_owned()),
            })
            .collect();
        Self { segments }
    }

    /// Returns the captured parameters when `path` matches.
    fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = split(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captured = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Capture(name) => captured.push((name.clone(), part.to_owned())),
            }
        }
        Some(Params::new(captured))
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// ============================================================================
// Dispatcher
// ============================================================================

#[derive(Clone)]
struct RouteLayer {
    method: Option<Method>,
    pattern: Pattern,
    handler: NativeHandler,
}

impl RouteLayer {
    fn accepts(&self, method: &Method) -> bool {
        self.method.as_ref().is_none_or(|m| m == method)
    }
}

/// In-memory reference router.
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync`; `dispatch` only needs `&self`.
#[derive(Default, Clone)]
pub struct Dispatcher {
    layers: Vec<RouteLayer>,
    params: HashMap<String, Vec<NativeParamHandler>>,
}

impl Dispatcher {
    /// Creates a new, empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered route layers.
    pub fn route_count(&self) -> usize {
        self.layers.len()
    }

    /// Dispatches one request through the matching layers.
    ///
    /// Returns [`Flow::Halt`] when some handler ended the chain, and
    /// [`Flow::Next`] when every matching handler passed it on (the caller's
    /// "not found" case).
    pub async fn dispatch(&self, request: Arc<Request>, response: ResponseHandle) -> Flow {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            method = %request.method(),
            path = request.path()
        );

        async move {
            let method = request.method().clone();
            let path = request.path().to_owned();
            let root = Exchange::new(request, response);
            let mut resolved: HashSet<String> = HashSet::new();

            for layer in &self.layers {
                if !layer.accepts(&method) {
                    continue;
                }
                let Some(params) = layer.pattern.matches(&path) else {
                    continue;
                };
                let exchange = root.with_params(params);

                if self.run_params(&exchange, &mut resolved).await == Flow::Halt {
                    debug!("parameter handler ended the request");
                    return Flow::Halt;
                }

                if flow(layer.handler.clone().oneshot(exchange).await) == Flow::Halt {
                    debug!("handler ended the request");
                    return Flow::Halt;
                }
            }

            trace!("no handler ended the request");
            Flow::Next
        }
        .instrument(span)
        .await
    }

    async fn run_params(&self, exchange: &Exchange, resolved: &mut HashSet<String>) -> Flow {
        for (name, value) in exchange.params().iter() {
            if !resolved.insert(name.to_owned()) {
                continue;
            }
            let Some(handlers) = self.params.get(name) else {
                continue;
            };
            for handler in handlers {
                let call = handler.clone().oneshot((exchange.clone(), value.to_owned()));
                if flow(call.await) == Flow::Halt {
                    return Flow::Halt;
                }
            }
        }
        Flow::Next
    }
}

fn flow(result: Result<Flow, Infallible>) -> Flow {
    match result {
        Ok(flow) => flow,
        Err(never) => match never {},
    }
}

impl NativeRouter for Dispatcher {
    fn add_route(&mut self, method: Option<Method>, path: &str, handler: NativeHandler) {
        self.layers.push(RouteLayer {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    fn add_param(&mut self, name: &str, handler: NativeParamHandler) {
        self.params.entry(name.to_owned()).or_default().push(handler);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("route_count", &self.layers.len())
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .finish()
    }
}
