//! Response writing.
//!
//! The transport is reached only through [`ResponseSink`]. [`emit`] turns a
//! classified [`Outcome`] into at most one status + body write on that sink.

use std::sync::Arc;

use http::StatusCode;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::error::InternalWarning;
use crate::outcome::Outcome;

/// Response-writing primitives provided by the transport.
pub trait ResponseSink: Send {
    /// Returns `true` once any writer has started the response.
    fn headers_sent(&self) -> bool;

    fn set_status(&mut self, status: StatusCode);

    /// Writes a JSON-serialized body and finishes the response.
    fn write_json(&mut self, body: &Value);

    /// Writes a raw string body and finishes the response.
    fn write_raw(&mut self, body: &str);

    /// Finishes the response without a body.
    fn end(&mut self);

    /// Diagnostic channel for internal warnings. Not used for control flow.
    fn emit_warning(&mut self, _warning: &InternalWarning) {}
}

/// Writes `outcome` to `sink`.
///
/// Returns `Ok(true)` when a response was written, `Ok(false)` when the
/// outcome has nothing to write (absence, the pass-to-next sentinel, or an
/// override without a body).
///
/// # Errors
///
/// Returns [`InternalWarning::headers_sent`] instead of writing twice when
/// another writer has already started the response.
pub fn emit(sink: &mut dyn ResponseSink, outcome: Outcome) -> Result<bool, InternalWarning> {
    let (payload, status) = match outcome {
        Outcome::Absent | Outcome::PassNext => return Ok(false),
        Outcome::Payload(v) => (v, StatusCode::OK),
        Outcome::Override { payload: None, .. } => return Ok(false),
        Outcome::Override {
            payload: Some(v),
            status,
        } => (v, status),
        Outcome::Error(e) => {
            let (payload, status) = e.into_parts();
            (payload, status)
        }
    };

    if sink.headers_sent() {
        return Err(InternalWarning::headers_sent());
    }

    trace!(status = status.as_u16(), "writing response");
    sink.set_status(status);
    match &payload {
        Value::Object(_) | Value::Array(_) => sink.write_json(&payload),
        Value::String(s) => sink.write_raw(s),
        Value::Bool(_) | Value::Number(_) | Value::Null => sink.end(),
    }
    Ok(true)
}

// =============================================================================
// BufferedResponse
// =============================================================================

/// The body recorded by a [`BufferedResponse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Raw(String),
    Empty,
}

#[derive(Debug, Default)]
struct BufferedState {
    status: Option<StatusCode>,
    body: Option<Body>,
    writes: usize,
    warnings: Vec<InternalWarning>,
}

/// An in-memory [`ResponseSink`].
///
/// Clones share the same buffer, so one clone can be handed to the router
/// while another is kept to inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct BufferedResponse {
    state: Arc<Mutex<BufferedState>>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.state.lock().status
    }

    pub fn body(&self) -> Option<Body> {
        self.state.lock().body.clone()
    }

    /// Number of finished writes; anything above one is a double write.
    pub fn writes(&self) -> usize {
        self.state.lock().writes
    }

    pub fn is_written(&self) -> bool {
        self.writes() > 0
    }

    /// Warnings received on the diagnostic channel.
    pub fn warnings(&self) -> Vec<InternalWarning> {
        self.state.lock().warnings.clone()
    }

    fn finish(&self, body: Body) {
        let mut state = self.state.lock();
        state.body = Some(body);
        state.writes += 1;
    }
}

impl ResponseSink for BufferedResponse {
    fn headers_sent(&self) -> bool {
        self.state.lock().writes > 0
    }

    fn set_status(&mut self, status: StatusCode) {
        self.state.lock().status = Some(status);
    }

    fn write_json(&mut self, body: &Value) {
        self.finish(Body::Json(body.clone()));
    }

    fn write_raw(&mut self, body: &str) {
        self.finish(Body::Raw(body.to_owned()));
    }

    fn end(&mut self) {
        self.finish(Body::Empty);
    }

    fn emit_warning(&mut self, warning: &InternalWarning) {
        self.state.lock().warnings.push(warning.clone());
    }
}
