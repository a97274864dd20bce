//! Request/response pair handed to every handler in a chain.
//!
//! One [`Request`] is created per incoming call and shared through an `Arc`
//! by every handler that runs for it. Each handler receives an [`Exchange`]:
//! the shared request, the path parameters captured by the route that matched,
//! and a handle to the response sink.
//!
//! The request also owns the connection's [`CancellationToken`]. The transport
//! cancels it when the client disconnects, and the pipeline stops producing
//! side effects from that point on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::InternalWarning;
use crate::sink::ResponseSink;

// =============================================================================
// Request
// =============================================================================

/// The incoming request, shared by all handlers of one dispatch.
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Value>,
    closed: CancellationToken,
    /// Values produced by parameter handlers, keyed by parameter name.
    resolved: Mutex<HashMap<String, Value>>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            closed: CancellationToken::new(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Attaches a decoded JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Uses the transport's token for the connection lifecycle.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.closed = token;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Token cancelled when the underlying connection closes.
    pub fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Records the value a parameter handler resolved for `name`.
    pub fn set_resolved(&self, name: impl Into<String>, value: Value) {
        self.resolved.lock().insert(name.into(), value);
    }

    /// Returns the value a parameter handler resolved for `name`.
    pub fn resolved(&self, name: &str) -> Option<Value> {
        self.resolved.lock().get(name).cloned()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Params
// =============================================================================

/// Path parameters captured by the route currently executing, in the order
/// the route pattern declares them.
#[derive(Debug, Clone, Default)]
pub struct Params(Arc<Vec<(String, String)>>);

impl Params {
    /// Builds parameters from `(name, value)` pairs in capture order. A name
    /// given twice keeps its last value.
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        let mut unique: Vec<(String, String)> = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            match unique.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = value,
                None => unique.push((name, value)),
            }
        }
        Self(Arc::new(unique))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// =============================================================================
// Response handle
// =============================================================================

/// Shared, lockable access to the transport's response sink.
#[derive(Clone)]
pub struct ResponseHandle {
    sink: Arc<Mutex<Box<dyn ResponseSink>>>,
}

impl ResponseHandle {
    pub fn new(sink: impl ResponseSink + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Runs `f` with exclusive access to the sink.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn ResponseSink) -> R) -> R {
        let mut sink = self.sink.lock();
        f(&mut **sink)
    }

    pub fn headers_sent(&self) -> bool {
        self.sink.lock().headers_sent()
    }

    /// Publishes an internal warning on the response's diagnostic channel.
    pub fn publish_warning(&self, warning: &InternalWarning) {
        self.sink.lock().emit_warning(warning);
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("headers_sent", &self.headers_sent())
            .finish()
    }
}

// =============================================================================
// Exchange
// =============================================================================

/// Everything one handler invocation works with.
#[derive(Debug, Clone)]
pub struct Exchange {
    request: Arc<Request>,
    params: Params,
    response: ResponseHandle,
}

impl Exchange {
    pub fn new(request: Arc<Request>, response: ResponseHandle) -> Self {
        Self {
            request,
            params: Params::default(),
            response,
        }
    }

    /// Returns a copy of this exchange scoped to another route's parameters.
    pub fn with_params(&self, params: Params) -> Self {
        Self {
            request: Arc::clone(&self.request),
            params,
            response: self.response.clone(),
        }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    pub fn is_closed(&self) -> bool {
        self.request.is_closed()
    }
}

// =============================================================================
// Flow
// =============================================================================

/// Native chain control: what the router does after a handler finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Invoke the next handler in the chain.
    Next,
    /// Stop the chain.
    Halt,
}
