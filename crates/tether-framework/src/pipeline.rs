//! The error pipeline.
//!
//! One handler invocation moves through these stages:
//!
//! ```text
//! invoke ──▶ settle ──▶ success formatter ──▶ classify ──▶ Outcome
//!    │          │               │                 │
//!    └──────────┴───────┬───────┴─────────────────┘
//!                       ▼
//!          warning ─▶ Err (swallowed by the caller)
//!          domain  ─▶ error formatter ─▶ its reply, or the error itself
//!          other   ─▶ error formatter ─▶ its reply, or fallback 500
//! ```
//!
//! [`run`] never fails with anything but an [`InternalWarning`]: every other
//! failure is converted into an [`Outcome`] the emitter can write.

use futures::future::BoxFuture;
use http::StatusCode;
use tracing::{error, trace, warn};

use crate::settings::{ErrorFormatter, RouterSettings};
use tether_core::{Exchange, Failure, InternalWarning, Outcome, Reply, Resolved, classify, settle};

/// Runs the pipeline for one invocation.
///
/// # Errors
///
/// Returns the [`InternalWarning`] raised anywhere on the success path. The
/// caller decides how to report it (see [`swallow`]).
pub async fn run(
    invoke: BoxFuture<'static, Result<Reply, Failure>>,
    exchange: &Exchange,
    settings: &RouterSettings,
) -> Result<Outcome, InternalWarning> {
    let result = match invoke.await {
        Ok(reply) => succeed(reply, exchange, settings).await,
        Err(failure) => Err(failure),
    };

    match result {
        Ok(Outcome::Error(e)) => Ok(format_failure(Failure::Domain(e), exchange, settings).await),
        Ok(outcome) => Ok(outcome),
        Err(Failure::Warning(w)) => Err(w),
        Err(failure) => Ok(format_failure(failure, exchange, settings).await),
    }
}

async fn succeed(reply: Reply, exchange: &Exchange, settings: &RouterSettings) -> Result<Outcome, Failure> {
    let resolved = match (settle(reply).await?, &settings.success_formatter) {
        (Resolved::Value(payload), Some(formatter)) => {
            trace!("applying success formatter");
            let formatted = formatter(payload, exchange).map_err(Failure::from_boxed)?;
            settle(formatted).await?
        }
        (resolved, _) => resolved,
    };
    Ok(classify(resolved)?)
}

// ============================================================================
// Failure formatting
// ============================================================================

/// Turns a failure into the outcome that is written for it.
async fn format_failure(failure: Failure, exchange: &Exchange, settings: &RouterSettings) -> Outcome {
    let Some(formatter) = &settings.error_formatter else {
        return unformatted(failure, exchange, settings);
    };

    match formatted(formatter, &failure, exchange).await {
        Ok(Resolved::Absent) => unformatted(failure, exchange, settings),
        Ok(resolved) => match classify(resolved) {
            Ok(Outcome::Payload(payload)) => Outcome::Override {
                payload: Some(payload),
                status: status_of(&failure),
            },
            Ok(outcome @ (Outcome::Override { .. } | Outcome::Error(_))) => outcome,
            Ok(Outcome::PassNext) => {
                swallow(
                    &InternalWarning::new("an error formatter cannot pass to the next handler"),
                    exchange,
                    settings,
                );
                unformatted(failure, exchange, settings)
            }
            Ok(Outcome::Absent) => unformatted(failure, exchange, settings),
            Err(warning) => {
                swallow(&warning, exchange, settings);
                unformatted(failure, exchange, settings)
            }
        },
        // The formatter's own domain error is final; it is not formatted again.
        Err(Failure::Domain(e)) => Outcome::Error(e),
        Err(Failure::Warning(warning)) => {
            swallow(&warning, exchange, settings);
            unformatted(failure, exchange, settings)
        }
        Err(Failure::Other(e)) => {
            if !exchange.is_closed() {
                error!(error = %e, "error formatter failed");
            }
            fallback(failure, exchange, settings)
        }
    }
}

async fn formatted(formatter: &ErrorFormatter, failure: &Failure, exchange: &Exchange) -> Result<Resolved, Failure> {
    let reply = formatter(failure, exchange).map_err(Failure::from_boxed)?;
    settle(reply).await
}

/// Default handling when no formatter produced anything.
fn unformatted(failure: Failure, exchange: &Exchange, settings: &RouterSettings) -> Outcome {
    match failure {
        Failure::Domain(e) => Outcome::Error(e),
        failure => fallback(failure, exchange, settings),
    }
}

/// The terminal catch-all: the fallback payload with `500`.
fn fallback(failure: Failure, exchange: &Exchange, settings: &RouterSettings) -> Outcome {
    if !exchange.is_closed() {
        error!(
            method = %exchange.request().method(),
            path = exchange.request().path(),
            error = %failure,
            "unhandled handler failure"
        );
    }
    Outcome::Override {
        payload: Some(settings.fallback.clone()),
        status: StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn status_of(failure: &Failure) -> StatusCode {
    match failure {
        Failure::Domain(e) => e.status(),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Warnings
// ============================================================================

/// Reports an internal warning without affecting the response.
///
/// The warning is always published on the response's diagnostic channel. It
/// is logged too unless warnings are silenced, through the injected sink when
/// one is configured. Nothing happens once the connection has closed.
pub fn swallow(warning: &InternalWarning, exchange: &Exchange, settings: &RouterSettings) {
    if exchange.is_closed() {
        return;
    }

    exchange.response().publish_warning(warning);
    if settings.silence_warnings {
        return;
    }

    match &settings.warning_sink {
        Some(sink) => sink(warning),
        None => warn!(path = exchange.request().path(), "{}", warning.message()),
    }
}
