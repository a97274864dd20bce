//! Handler-wrapping adapter.
//!
//! [`HandlerService`] and [`ParamService`] turn value-returning handlers into
//! tower services speaking the native router's [`Flow`] protocol. Every call
//! runs the [`pipeline`](crate::pipeline) under the request's cancellation
//! token and ends in exactly one of: a written response, a hand-off to the
//! next handler, or a swallowed warning.
//!
//! ```text
//! native router ──Exchange──▶ HandlerService ──▶ Handler::call
//!                                  │
//!                      select! { closed, pipeline::run }
//!                                  │
//!                  emit ─▶ Flow::Halt   /   Flow::Next
//! ```

use std::convert::Infallible;
use std::marker::PhantomData;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;
use tracing::{debug, trace};

use crate::handler::{Handler, ParamHandler};
use crate::pipeline::{self, swallow};
use crate::settings::{RouterSettings, SharedSettings};
use tether_core::{Exchange, Failure, Flow, Outcome, Reply, emit};

/// How a wrapped handler's outcome maps onto chain control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Convention {
    /// The handler owns the response. Only the pass-to-next sentinel proceeds.
    #[default]
    Respond,
    /// The handler guards the chain. Explicit responses and errors that
    /// write a body stop the chain; anything that writes nothing proceeds.
    PassThrough,
}

/// Drives one invocation to its terminal state.
///
/// `param` names the route parameter a pass-through payload is recorded
/// under.
pub async fn drive(
    invoke: BoxFuture<'static, Result<Reply, Failure>>,
    exchange: Exchange,
    settings: RouterSettings,
    convention: Convention,
    param: Option<String>,
) -> Flow {
    let closed = exchange.request().closed().clone();

    let outcome = tokio::select! {
        biased;

        _ = closed.cancelled() => {
            debug!(path = exchange.request().path(), "connection closed, dropping handler result");
            return Flow::Halt;
        }
        outcome = pipeline::run(invoke, &exchange, &settings) => outcome,
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(warning) => {
            swallow(&warning, &exchange, &settings);
            return Flow::Halt;
        }
    };

    match (convention, outcome) {
        (_, Outcome::PassNext) => Flow::Next,
        (Convention::PassThrough, Outcome::Payload(value)) => {
            if let Some(name) = param {
                trace!(param = %name, "recording resolved parameter");
                exchange.request().set_resolved(name, value);
            }
            Flow::Next
        }
        (Convention::PassThrough, Outcome::Absent) => Flow::Next,
        (convention, outcome) => match respond(&exchange, &settings, outcome) {
            // A guard that wrote nothing still owes the chain a response.
            Written::Nothing if convention == Convention::PassThrough => Flow::Next,
            _ => Flow::Halt,
        },
    }
}

/// What [`respond`] did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    Response,
    Nothing,
    Dropped,
}

fn respond(exchange: &Exchange, settings: &RouterSettings, outcome: Outcome) -> Written {
    if exchange.is_closed() {
        return Written::Dropped;
    }

    match exchange.response().with(|sink| emit(sink, outcome)) {
        Ok(true) => {
            trace!("response written");
            Written::Response
        }
        Ok(false) => {
            trace!("nothing to write");
            Written::Nothing
        }
        Err(warning) => {
            swallow(&warning, exchange, settings);
            Written::Dropped
        }
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] running one [`Handler`] through the pipeline.
pub struct HandlerService<H, T> {
    handler: H,
    settings: SharedSettings,
    convention: Convention,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T> HandlerService<H, T>
where
    H: Handler<T>,
{
    pub fn new(handler: H, settings: SharedSettings, convention: Convention) -> Self {
        Self {
            handler,
            settings,
            convention,
            _marker: PhantomData,
        }
    }
}

impl<H: Clone, T> Clone for HandlerService<H, T> {
    fn clone(&self) -> Self {
        HandlerService {
            handler: self.handler.clone(),
            settings: self.settings.clone(),
            convention: self.convention,
            _marker: PhantomData,
        }
    }
}

impl<H, T> Service<Exchange> for HandlerService<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    type Response = Flow;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Flow, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, exchange: Exchange) -> Self::Future {
        let invoke = self.handler.clone().call(exchange.clone());
        drive(invoke, exchange, self.settings.snapshot(), self.convention, None)
            .map(Ok)
            .boxed()
    }
}

// ============================================================================
// ParamService
// ============================================================================

/// A tower [`Service`] running a [`ParamHandler`] for one named parameter.
///
/// Called with the exchange and the raw captured value. Always uses the
/// pass-through convention.
pub struct ParamService<P> {
    name: String,
    resolver: P,
    settings: SharedSettings,
}

impl<P: ParamHandler> ParamService<P> {
    pub fn new(name: impl Into<String>, resolver: P, settings: SharedSettings) -> Self {
        Self {
            name: name.into(),
            resolver,
            settings,
        }
    }
}

impl<P: Clone> Clone for ParamService<P> {
    fn clone(&self) -> Self {
        ParamService {
            name: self.name.clone(),
            resolver: self.resolver.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<P: ParamHandler> Service<(Exchange, String)> for ParamService<P> {
    type Response = Flow;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Flow, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (exchange, value): (Exchange, String)) -> Self::Future {
        let invoke = self.resolver.clone().resolve(exchange.clone(), value);
        drive(
            invoke,
            exchange,
            self.settings.snapshot(),
            Convention::PassThrough,
            Some(self.name.clone()),
        )
        .map(Ok)
        .boxed()
    }
}
