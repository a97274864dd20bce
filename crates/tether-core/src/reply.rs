//! The value a route handler returns.
//!
//! [`Reply`] is a closed set of shapes: plain payloads, deferred payloads
//! (futures or streams), mappings whose fields may be deferred, explicit
//! responses, domain errors, the pass-to-next sentinel, and absence.
//!
//! Handlers rarely build a `Reply` by hand. Any type implementing
//! [`IntoReply`] can be returned instead:
//!
//! ```rust
//! use tether_core::{IntoReply, Next, Reply, Respond};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! let plain = json!({ "id": 1 }).into_reply();
//! let created = Respond::new(StatusCode::CREATED, json!({ "id": 2 })).into_reply();
//! let skip = Next.into_reply();
//! let later = Reply::deferred(async { "ready" });
//! # let _ = (plain, created, skip, later);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BoxError, DomainError, Failure};

// ============================================================================
// Reply
// ============================================================================

/// A handler result before resolution.
pub enum Reply {
    /// A literal payload: string, number, boolean, null, object or array.
    Value(Value),
    /// A mapping whose field values may themselves be deferred.
    Map(BTreeMap<String, Reply>),
    /// A pending computation producing another reply.
    Deferred(BoxFuture<'static, Result<Reply, Failure>>),
    /// A stream whose first item is the reply; later items are ignored.
    Stream(BoxStream<'static, Result<Reply, Failure>>),
    /// A payload paired with an explicit status code.
    Respond(Respond),
    /// A domain error returned as a value.
    Fail(DomainError),
    /// Do not respond; run the next handler in the chain.
    Next,
    /// Nothing was produced.
    Absent,
}

impl Reply {
    /// Wraps any JSON-convertible value.
    pub fn value(value: impl Into<Value>) -> Self {
        Reply::Value(value.into())
    }

    /// Wraps a future whose output converts into a reply.
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future + Send + 'static,
        F::Output: IntoReply,
    {
        Reply::Deferred(fut.map(IntoReply::into_reply).boxed())
    }

    /// Wraps a stream; only its first item is used.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream + Send + 'static,
        S::Item: IntoReply,
    {
        Reply::Stream(stream.map(IntoReply::into_reply).boxed())
    }

    /// Builds a mapping from `(key, reply)` pairs. Later duplicates replace
    /// earlier ones.
    pub fn map<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Reply)>,
    {
        Reply::Map(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// A reply that fails with `failure` when resolved.
    pub fn raise(failure: impl Into<Failure>) -> Self {
        let failure = failure.into();
        Reply::Deferred(futures::future::ready(Err(failure)).boxed())
    }

    /// Returns `true` if the reply still needs to be awaited.
    pub fn is_pending(&self) -> bool {
        matches!(self, Reply::Deferred(_) | Reply::Stream(_))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Reply::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Reply::Deferred(_) => f.write_str("Deferred(..)"),
            Reply::Stream(_) => f.write_str("Stream(..)"),
            Reply::Respond(r) => f.debug_tuple("Respond").field(r).finish(),
            Reply::Fail(e) => f.debug_tuple("Fail").field(e).finish(),
            Reply::Next => f.write_str("Next"),
            Reply::Absent => f.write_str("Absent"),
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl From<Respond> for Reply {
    fn from(respond: Respond) -> Self {
        Reply::Respond(respond)
    }
}

impl From<DomainError> for Reply {
    fn from(err: DomainError) -> Self {
        Reply::Fail(err)
    }
}

impl From<Next> for Reply {
    fn from(_: Next) -> Self {
        Reply::Next
    }
}

// ============================================================================
// Respond / Next / Json
// ============================================================================

/// An explicit response: a payload with a status other than the implicit 200.
#[derive(Debug)]
pub struct Respond {
    pub(crate) payload: Box<Reply>,
    pub(crate) status: StatusCode,
}

impl Respond {
    pub fn new(status: StatusCode, payload: impl IntoReply) -> Self {
        let payload = payload.into_reply().unwrap_or_else(Reply::raise);
        Self {
            payload: Box::new(payload),
            status,
        }
    }

    /// A response with status only and no body.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            payload: Box::new(Reply::Absent),
            status,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// The pass-to-next sentinel.
///
/// Returning it tells the adapter to skip writing a response and hand control
/// to the next handler registered for the route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Next;

/// Serializes any `T: Serialize` into a JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

// ============================================================================
// IntoReply
// ============================================================================

/// Types that can be returned from a handler.
///
/// A conversion may fail: `Result::Err` raises its error into the pipeline,
/// and serialization failures of [`Json`] are raised the same way.
pub trait IntoReply: Send {
    fn into_reply(self) -> Result<Reply, Failure>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(self)
    }
}

/// `()` means the handler produced nothing.
impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(Reply::Absent)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(Reply::Value(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(Reply::Value(Value::String(self)))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(Reply::Value(Value::from(self)))
    }
}

macro_rules! impl_into_reply_scalar {
    ($($ty:ty),*) => {
        $(
            impl IntoReply for $ty {
                fn into_reply(self) -> Result<Reply, Failure> {
                    Ok(Reply::Value(Value::from(self)))
                }
            }
        )*
    };
}

impl_into_reply_scalar!(bool, i32, i64, u32, u64, usize, f64);

impl IntoReply for Respond {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(Reply::Respond(self))
    }
}

impl IntoReply for DomainError {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(Reply::Fail(self))
    }
}

impl IntoReply for Next {
    fn into_reply(self) -> Result<Reply, Failure> {
        Ok(Reply::Next)
    }
}

impl<T: Serialize + Send> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Reply, Failure> {
        serde_json::to_value(self.0)
            .map(Reply::Value)
            .map_err(Failure::other)
    }
}

/// `None` is absence; `Some` delegates to the inner value.
impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, Failure> {
        match self {
            Some(t) => t.into_reply(),
            None => Ok(Reply::Absent),
        }
    }
}

/// `Err` raises the error; its kind is recovered by downcasting.
impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError> + Send,
{
    fn into_reply(self) -> Result<Reply, Failure> {
        match self {
            Ok(t) => t.into_reply(),
            Err(e) => Err(Failure::from_boxed(e.into())),
        }
    }
}
