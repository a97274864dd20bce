//! Resolution of deferred handler results.
//!
//! Three functions make up the resolution layer:
//!
//! - [`resolve`] – the single admission point. Every reply shape (literal,
//!   future, stream) becomes a stream yielding at most one item.
//! - [`settle`] – drives [`resolve`] until no deferred layer is left,
//!   producing a [`Resolved`] value.
//! - [`deep_resolve`] – settles every field of a mapping concurrently and
//!   merges the results into one JSON object.
//!
//! Only mappings are descended into. A list can only ever be a literal
//! [`Value::Array`], so there is nothing deferred inside one to resolve.

use std::collections::BTreeMap;

use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt, TryFutureExt};
use http::StatusCode;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Failure, InternalWarning};
use crate::reply::Reply;

/// A reply with every deferred layer settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Value(Value),
    Respond(Box<Resolved>, StatusCode),
    Fail(crate::error::DomainError),
    Next,
    Absent,
}

// ============================================================================
// Resolution primitive
// ============================================================================

/// Normalizes a reply into a single-item asynchronous sequence.
///
/// Streams are returned unchanged, futures are adapted with
/// [`stream::once`], and every other shape becomes an already-completed
/// one-item stream. Callers consume at most the first item.
pub fn resolve(reply: Reply) -> BoxStream<'static, Result<Reply, Failure>> {
    match reply {
        Reply::Stream(s) => s,
        Reply::Deferred(fut) => stream::once(fut).boxed(),
        literal => stream::once(future::ready(Ok(literal))).boxed(),
    }
}

/// Resolves a reply until no future or stream remains.
///
/// A stream that finishes without yielding settles to [`Resolved::Absent`].
/// Mappings go through [`deep_resolve`]; the payload of an explicit response
/// is settled as well.
pub fn settle(reply: Reply) -> BoxFuture<'static, Result<Resolved, Failure>> {
    async move {
        let mut items = resolve(reply);
        let Some(item) = items.next().await else {
            trace!("deferred reply completed without a value");
            return Ok(Resolved::Absent);
        };
        // Dropping the stream here unsubscribes from any remaining items.
        drop(items);

        match item? {
            pending @ (Reply::Deferred(_) | Reply::Stream(_)) => settle(pending).await,
            Reply::Map(fields) => deep_resolve(fields).await.map(|m| Resolved::Value(Value::Object(m))),
            Reply::Value(v) => Ok(Resolved::Value(v)),
            Reply::Respond(r) => {
                let inner = settle(*r.payload).await?;
                Ok(Resolved::Respond(Box::new(inner), r.status))
            }
            Reply::Fail(e) => Ok(Resolved::Fail(e)),
            Reply::Next => Ok(Resolved::Next),
            Reply::Absent => Ok(Resolved::Absent),
        }
    }
    .boxed()
}

// ============================================================================
// Deep resolution
// ============================================================================

/// Settles every field of a mapping and merges them into one object.
///
/// Fields resolve concurrently; the first failure wins. An empty mapping
/// completes immediately.
///
/// Per field:
/// - an absent value is left out of the object,
/// - a domain error is raised for the whole mapping,
/// - the pass-to-next sentinel or an explicit response is an
///   [`InternalWarning`], since neither has a meaning inside a payload.
pub fn deep_resolve(
    fields: BTreeMap<String, Reply>,
) -> BoxFuture<'static, Result<Map<String, Value>, Failure>> {
    if fields.is_empty() {
        return future::ready(Ok(Map::new())).boxed();
    }

    let branches = fields
        .into_iter()
        .map(|(key, reply)| settle(reply).and_then(move |resolved| settle_field(key, resolved)));

    future::try_join_all(branches)
        .map_ok(|entries| entries.into_iter().flatten().collect())
        .boxed()
}

async fn settle_field(key: String, resolved: Resolved) -> Result<Option<(String, Value)>, Failure> {
    match resolved {
        Resolved::Value(v) => Ok(Some((key, v))),
        Resolved::Absent => Ok(None),
        Resolved::Fail(e) => Err(Failure::Domain(e)),
        Resolved::Next => Err(InternalWarning::new(format!(
            "field '{key}' resolved to the pass-to-next sentinel"
        ))
        .into()),
        Resolved::Respond(..) => Err(InternalWarning::new(format!(
            "field '{key}' resolved to an explicit response"
        ))
        .into()),
    }
}
